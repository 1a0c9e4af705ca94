//! Texture binding strategies
//!
//! The coalescer is identical under both strategies; only the per-batch
//! binding differs. Cached sets create one bind group per distinct
//! texture combination and rebind it per batch; the bindless table gives
//! every texture a stable slot in one large binding array and never
//! rebinds group 1 mid-frame.

use std::num::NonZeroU32;

use hashbrown::HashMap;

use crate::texture::CachedTexture;

/// Key of one cached descriptor set: the four bound surface identities
/// (with their maskedness) plus the combined sampler-mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindKey {
    pub ids: [u64; 4],
    pub masked_bits: u8,
    pub sampler_bits: u8,
}

/// Per-device texture binding strategy.
pub enum TextureBinder {
    CachedSets {
        layout: wgpu::BindGroupLayout,
        groups: Vec<wgpu::BindGroup>,
        lookup: HashMap<BindKey, u32>,
    },
    Bindless {
        layout: wgpu::BindGroupLayout,
        placeholder: wgpu::TextureView,
        views: Vec<wgpu::TextureView>,
        capacity: u32,
        group: Option<wgpu::BindGroup>,
        overflowed: bool,
    },
}

impl TextureBinder {
    /// Group 1 layout for the cached-set strategy: four sampled textures.
    pub fn cached_sets(device: &wgpu::Device) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Set Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
            ],
        });
        Self::CachedSets {
            layout,
            groups: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Group 1 layout for the bindless strategy: one binding array.
    /// Slot 0 always holds the placeholder view.
    pub fn bindless(device: &wgpu::Device, placeholder: wgpu::TextureView, capacity: u32) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Table Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: Some(NonZeroU32::new(capacity).unwrap_or(NonZeroU32::MIN)),
            }],
        });
        Self::Bindless {
            layout,
            placeholder: placeholder.clone(),
            views: vec![placeholder],
            capacity: capacity.max(1),
            group: None,
            overflowed: false,
        }
    }

    pub fn is_bindless(&self) -> bool {
        matches!(self, Self::Bindless { .. })
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        match self {
            Self::CachedSets { layout, .. } | Self::Bindless { layout, .. } => layout,
        }
    }

    /// Bindless: the texture's stable table slot for a sampler mode,
    /// assigned on first use. Cached sets always return slot 0; the
    /// shader never reads it.
    pub fn slot_for(&mut self, texture: &mut CachedTexture, mode: u32) -> u32 {
        let Self::Bindless {
            views,
            capacity,
            group,
            overflowed,
            ..
        } = self
        else {
            return 0;
        };
        let mode = mode as usize & 3;
        if let Some(slot) = texture.slots[mode] {
            return slot;
        }
        if views.len() >= *capacity as usize {
            // Table full: degrade to the placeholder slot
            if !*overflowed {
                *overflowed = true;
                tracing::warn!(
                    "bindless texture table full ({} slots); new textures render as placeholder",
                    capacity
                );
            }
            texture.slots[mode] = Some(0);
            return 0;
        }
        let slot = views.len() as u32;
        views.push(texture.view.clone());
        texture.slots[mode] = Some(slot);
        *group = None;
        slot
    }

    /// Cached sets: index of the bind group for a texture combination,
    /// created on first use. Bindless always returns 0.
    pub fn bind_for(
        &mut self,
        device: &wgpu::Device,
        key: BindKey,
        views: [&wgpu::TextureView; 4],
    ) -> u32 {
        let Self::CachedSets {
            layout,
            groups,
            lookup,
        } = self
        else {
            return 0;
        };
        if let Some(&index) = lookup.get(&key) {
            return index;
        }
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Set"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[3]),
                },
            ],
        });
        let index = groups.len() as u32;
        groups.push(group);
        lookup.insert(key, index);
        index
    }

    /// Bind group to set at group 1 for a batch. Rebuilds the bindless
    /// table group if it grew since the last frame.
    pub fn group_for(&mut self, device: &wgpu::Device, bind: u32) -> &wgpu::BindGroup {
        match self {
            Self::CachedSets { groups, .. } => &groups[bind as usize],
            Self::Bindless {
                layout,
                placeholder,
                views,
                capacity,
                group,
                ..
            } => {
                if group.is_none() {
                    let mut refs: Vec<&wgpu::TextureView> =
                        views.iter().collect();
                    refs.resize(*capacity as usize, placeholder);
                    *group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Texture Table"),
                        layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureViewArray(&refs),
                        }],
                    }));
                    tracing::debug!("rebuilt bindless texture table ({} live slots)", views.len());
                }
                group.as_ref().expect("table group just ensured")
            }
        }
    }

    /// Drop every cached binding (texture cache clear, resize). The
    /// bindless table keeps only the placeholder slot.
    pub fn clear(&mut self) {
        match self {
            Self::CachedSets { groups, lookup, .. } => {
                groups.clear();
                lookup.clear();
            }
            Self::Bindless {
                placeholder,
                views,
                group,
                overflowed,
                ..
            } => {
                views.clear();
                views.push(placeholder.clone());
                *group = None;
                *overflowed = false;
            }
        }
    }
}
