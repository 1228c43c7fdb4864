//! Graphics queue-family resolution and adapter selection.
//!
//! Both are kept free of live Vulkan calls so the selection policy is
//! deterministic and unit-testable: the caller enumerates adapters and
//! their queue families, and these routines decide.

use ash::vk;

/// Cached result of resolving an adapter's graphics queue family.
///
/// Resolution runs at most once; afterwards [`QueueFamilySelection::resolve_with`]
/// returns the cached index without re-scanning.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueueFamilySelection {
    graphics: Option<u32>,
    resolved: bool,
}

impl QueueFamilySelection {
    /// Returns the index of the first queue family advertising graphics
    /// capability, scanning `families` only on the first call.
    pub fn resolve_with(&mut self, families: &[vk::QueueFamilyProperties]) -> Option<u32> {
        if !self.resolved {
            self.graphics = families
                .iter()
                .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|index| index as u32);
            self.resolved = true;
        }
        self.graphics
    }

    /// The resolved graphics family index, if resolution has run and found
    /// one.
    pub fn graphics(&self) -> Option<u32> {
        self.graphics
    }

    /// Whether resolution has run for this adapter.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Picks the first adapter in enumeration order that exposes a
/// graphics-capable queue family.
///
/// First-match, not best-match: adapters are taken in the order the
/// driver enumerates them, with no capability scoring.
pub fn first_suitable_adapter<I>(adapters: I) -> Option<(vk::PhysicalDevice, QueueFamilySelection)>
where
    I: IntoIterator<Item = (vk::PhysicalDevice, Vec<vk::QueueFamilyProperties>)>,
{
    for (adapter, families) in adapters {
        let mut selection = QueueFamilySelection::default();
        if selection.resolve_with(&families).is_some() {
            return Some((adapter, selection));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn adapter(raw: u64) -> vk::PhysicalDevice {
        vk::PhysicalDevice::from_raw(raw)
    }

    #[test]
    fn picks_first_adapter_with_graphics_in_enumeration_order() {
        let adapters = vec![
            // A: compute/transfer only, not suitable.
            (
                adapter(1),
                vec![family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::TRANSFER)],
            ),
            // B: graphics capability at family index 2.
            (
                adapter(2),
                vec![
                    family(vk::QueueFlags::TRANSFER),
                    family(vk::QueueFlags::COMPUTE),
                    family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
                ],
            ),
            // C: graphics at index 0, but later in enumeration order.
            (adapter(3), vec![family(vk::QueueFlags::GRAPHICS)]),
        ];

        let (picked, selection) =
            first_suitable_adapter(adapters).expect("an adapter is suitable");
        assert_eq!(picked, adapter(2));
        assert_eq!(selection.graphics(), Some(2));
    }

    #[test]
    fn returns_none_when_no_adapter_has_graphics() {
        let adapters = vec![(adapter(1), vec![family(vk::QueueFlags::COMPUTE)])];
        assert!(first_suitable_adapter(adapters).is_none());
    }

    #[test]
    fn resolution_runs_at_most_once() {
        let mut selection = QueueFamilySelection::default();
        assert!(!selection.is_resolved());

        let index = selection.resolve_with(&[family(vk::QueueFlags::GRAPHICS)]);
        assert_eq!(index, Some(0));
        assert!(selection.is_resolved());

        // A second call with different input must not recompute.
        let again = selection.resolve_with(&[]);
        assert_eq!(again, Some(0));
    }

    #[test]
    fn unsuitable_resolution_is_also_cached() {
        let mut selection = QueueFamilySelection::default();
        assert_eq!(selection.resolve_with(&[family(vk::QueueFlags::COMPUTE)]), None);
        assert!(selection.is_resolved());
        assert_eq!(selection.resolve_with(&[family(vk::QueueFlags::GRAPHICS)]), None);
    }
}
