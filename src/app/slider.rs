// src/app/slider.rs — paging layout for large thumbnail sets, with the
// letter indicators (A..Z, AA, AB, ...) shown under the strip.

/// Below this many rows worth of thumbnails the grid stays unpaged.
pub const DEFAULT_ROW_THRESHOLD: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliderLayout {
    pub enabled: bool,
    pub images_per_slide: usize,
    pub total_slides: usize,
    pub total_images: usize,
}

impl Default for SliderLayout {
    fn default() -> Self {
        Self {
            enabled: false,
            images_per_slide: 0,
            total_slides: 1,
            total_images: 0,
        }
    }
}

impl SliderLayout {
    /// Paging turns on once the set would exceed `row_threshold` full
    /// rows. Rows are then spread as evenly as possible into slides of
    /// at most `row_threshold` rows, unless `rows_override` pins the
    /// rows-per-slide directly.
    pub fn compute(
        total_images: usize,
        images_per_row: usize,
        row_threshold: usize,
        rows_override: Option<usize>,
    ) -> Self {
        let per_row = images_per_row.max(1);
        let threshold = row_threshold.max(1);
        if total_images <= per_row * threshold {
            return Self {
                enabled: false,
                images_per_slide: total_images,
                total_slides: 1,
                total_images,
            };
        }

        let total_rows = total_images.div_ceil(per_row);
        let target_rows = rows_override
            .filter(|&r| r > 0)
            .unwrap_or_else(|| total_rows.div_ceil(total_rows.div_ceil(threshold)));
        let images_per_slide = (target_rows * per_row).min(total_images).max(1);
        let total_slides = total_images.div_ceil(images_per_slide);

        Self {
            enabled: true,
            images_per_slide,
            total_slides,
            total_images,
        }
    }

    pub fn slide_for_index(&self, index: usize) -> usize {
        if !self.enabled || self.images_per_slide == 0 {
            return 0;
        }
        (index / self.images_per_slide).min(self.total_slides.saturating_sub(1))
    }

    /// Slides worth warming once `slide` is on screen: the next one,
    /// then the previous one. Empty while paging is off.
    pub fn neighbor_slides(&self, slide: usize) -> Vec<usize> {
        if !self.enabled {
            return Vec::new();
        }
        let mut slides = Vec::with_capacity(2);
        if slide + 1 < self.total_slides {
            slides.push(slide + 1);
        }
        if slide > 0 {
            slides.push(slide - 1);
        }
        slides
    }

    /// Image index range covered by `slide`. The last slide may be short.
    pub fn slide_range(&self, slide: usize) -> std::ops::Range<usize> {
        if !self.enabled {
            return 0..self.total_images;
        }
        let start = (slide * self.images_per_slide).min(self.total_images);
        let end = (start + self.images_per_slide).min(self.total_images);
        start..end
    }
}

/// Spreadsheet-style label for a slide: 0 -> "A", 25 -> "Z", 26 -> "AA".
pub fn indicator_label(slide: usize) -> String {
    let mut n = slide;
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sets_stay_unpaged() {
        let layout = SliderLayout::compute(16, 4, DEFAULT_ROW_THRESHOLD, None);
        assert!(!layout.enabled);
        assert_eq!(layout.total_slides, 1);
        assert_eq!(layout.slide_range(0), 0..16);
    }

    #[test]
    fn thirty_seven_images_page_evenly() {
        let layout = SliderLayout::compute(37, 4, 4, None);
        assert!(layout.enabled);
        // 10 rows -> 3 slides -> ceil(10/3)=4 rows per slide -> 16 images
        assert_eq!(layout.images_per_slide, 16);
        assert_eq!(layout.total_slides, 3);
        assert_eq!(layout.slide_range(0), 0..16);
        assert_eq!(layout.slide_range(1), 16..32);
        assert_eq!(layout.slide_range(2), 32..37);
    }

    #[test]
    fn slide_ranges_partition_every_index() {
        for total in [17, 33, 64, 100, 257] {
            let layout = SliderLayout::compute(total, 4, 4, None);
            let mut covered = 0;
            for slide in 0..layout.total_slides {
                let range = layout.slide_range(slide);
                assert_eq!(range.start, covered);
                for i in range.clone() {
                    assert_eq!(layout.slide_for_index(i), slide);
                }
                covered = range.end;
            }
            assert_eq!(covered, total);
        }
    }

    #[test]
    fn neighbor_slides_cover_next_then_previous() {
        // 37 images over 3 slides
        let layout = SliderLayout::compute(37, 4, 4, None);
        assert_eq!(layout.neighbor_slides(0), vec![1]);
        assert_eq!(layout.neighbor_slides(1), vec![2, 0]);
        assert_eq!(layout.neighbor_slides(2), vec![1]);

        let unpaged = SliderLayout::compute(8, 4, 4, None);
        assert!(unpaged.neighbor_slides(0).is_empty());
    }

    #[test]
    fn rows_override_pins_slide_size() {
        let layout = SliderLayout::compute(40, 4, 4, Some(2));
        assert_eq!(layout.images_per_slide, 8);
        assert_eq!(layout.total_slides, 5);
    }

    #[test]
    fn indicator_labels_roll_over_like_columns() {
        assert_eq!(indicator_label(0), "A");
        assert_eq!(indicator_label(25), "Z");
        assert_eq!(indicator_label(26), "AA");
        assert_eq!(indicator_label(27), "AB");
        assert_eq!(indicator_label(51), "AZ");
        assert_eq!(indicator_label(52), "BA");
    }
}
