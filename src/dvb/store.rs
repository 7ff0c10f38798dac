//! Per-stream state shared by the segment handlers.

use std::collections::BTreeMap;

use super::{Clut, DisplayDefinition, ObjectDisplays, Object, PageComposition, Region};

/// Regions, objects, CLUTs and the page they compose into.
///
/// Each segment kind adds its own `apply_*` method in its module.
#[derive(Debug, Default)]
pub struct SubtitleStore {
    pub page: PageComposition,
    pub regions: BTreeMap<u8, Region>,
    pub objects: BTreeMap<u16, Object>,
    pub cluts: BTreeMap<u8, Clut>,
    pub displays: ObjectDisplays,
    pub display_definition: Option<DisplayDefinition>,
}

impl SubtitleStore {
    /// Drop every region, object and CLUT. The page and display definition stay.
    pub fn reset_epoch(&mut self) {
        self.regions.clear();
        self.objects.clear();
        self.cluts.clear();
        self.displays.clear();
    }

    /// Forget everything, including page and display definition.
    pub fn clear(&mut self) {
        self.reset_epoch();
        self.page = PageComposition::default();
        self.display_definition = None;
    }

    pub fn clear_dirty(&mut self, region_ids: &[u8]) {
        for id in region_ids {
            if let Some(region) = self.regions.get_mut(id) {
                region.dirty = false;
            }
        }
    }

    /// Check that every object display sits on exactly one region list and
    /// exactly one object list.
    #[cfg(test)]
    pub(crate) fn assert_display_links(&self) {
        for (id, display) in self.displays.iter() {
            let on_regions: usize = self
                .regions
                .values()
                .map(|r| r.displays.iter().filter(|&&d| d == id).count())
                .sum();
            let on_objects: usize = self
                .objects
                .values()
                .map(|o| o.displays.iter().filter(|&&d| d == id).count())
                .sum();
            assert_eq!(on_regions, 1, "display {:?} on {} region lists", id, on_regions);
            assert_eq!(on_objects, 1, "display {:?} on {} object lists", id, on_objects);
            assert!(self.regions[&display.region_id].displays.contains(&id));
            assert!(self.objects[&display.object_id].displays.contains(&id));
        }
        for region in self.regions.values() {
            assert_eq!(region.pixels.len(), region.width as usize * region.height as usize);
            for id in &region.displays {
                assert!(self.displays.get(*id).is_some());
            }
        }
        for object in self.objects.values() {
            for id in &object.displays {
                assert!(self.displays.get(*id).is_some());
            }
        }
    }
}
