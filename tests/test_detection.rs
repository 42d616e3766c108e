//! Integration tests for line detection on synthetic frames.
//!
//! Tests cover:
//! - Segments found for white, yellow and red markings, grouped by color
//! - Normal orientation per color under the default and a narrow dilation
//! - Red on both sides of the hue wraparound
//! - Top cutoff and resizing in the normalized coordinates
//! - Color transform and reproducibility

mod common;

use common::*;

#[test]
fn white_diagonal_stripe() {
    let list = process(&square_config(), diagonal_stripe());

    assert!(list.count(SegmentColor::White) >= 1);
    assert_eq!(list.count(SegmentColor::Yellow), 0);
    assert_eq!(list.count(SegmentColor::Red), 0);
    assert_in_unit_square(&list);
    assert_unit_normals(&list);

    // Segments follow the stripe, i.e. run roughly along the diagonal.
    for segment in list.of_color(SegmentColor::White) {
        let [a, b] = segment.pixels_normalized;
        assert!((a.x - a.y).abs() < 0.1, "{:?}", segment);
        assert!((b.x - b.y).abs() < 0.1, "{:?}", segment);
    }
}

#[test]
fn black_frame_is_empty() {
    let image = vertical_bars(100, 100, &[]);
    let list = process(&square_config(), image);
    assert!(list.segments.is_empty());
}

fn narrow_dilation() -> NodeConfig {
    let mut config = square_config();
    config.detection.dilation_kernel_size = 1;
    config
}

/// Segments left of `split` (normalized x) and right of it
fn split_by_x<'a>(
    list: &'a SegmentList,
    color: SegmentColor,
    split: f32,
) -> (Vec<&'a Segment>, Vec<&'a Segment>) {
    list.of_color(color)
        .partition(|s| s.pixels_normalized[0].x < split)
}

/// Default dilation (3 px, same as the sampling offset) and a single pixel
fn polarity_configs() -> [NodeConfig; 2] {
    [square_config(), narrow_dilation()]
}

#[test]
fn yellow_normals_point_away_from_marking() {
    for config in polarity_configs() {
        let image = vertical_bars(100, 100, &[(40, 50, YELLOW)]);
        let list = process(&config, image);
        let dilation = config.detection.dilation_kernel_size;

        assert_eq!(list.count(SegmentColor::White), 0);
        let (left, right) = split_by_x(&list, SegmentColor::Yellow, 0.45);
        assert!(!left.is_empty() && !right.is_empty(), "dilation {}", dilation);
        assert!(left.iter().all(|s| s.normal.x < 0.0), "dilation {}: {:?}", dilation, left);
        assert!(right.iter().all(|s| s.normal.x > 0.0), "dilation {}: {:?}", dilation, right);
    }
}

#[test]
fn white_normals_point_into_marking() {
    for config in polarity_configs() {
        let image = vertical_bars(100, 100, &[(40, 50, WHITE)]);
        let list = process(&config, image);
        let dilation = config.detection.dilation_kernel_size;

        let (left, right) = split_by_x(&list, SegmentColor::White, 0.45);
        assert!(!left.is_empty() && !right.is_empty(), "dilation {}", dilation);
        assert!(left.iter().all(|s| s.normal.x > 0.0), "dilation {}: {:?}", dilation, left);
        assert!(right.iter().all(|s| s.normal.x < 0.0), "dilation {}: {:?}", dilation, right);
    }
}

#[test]
fn red_normals_point_away_from_marking() {
    let image = vertical_bars(100, 100, &[(40, 50, RED_LOW)]);
    let list = process(&square_config(), image);

    let (left, right) = split_by_x(&list, SegmentColor::Red, 0.45);
    assert!(!left.is_empty() && !right.is_empty());
    assert!(left.iter().all(|s| s.normal.x < 0.0), "{:?}", left);
    assert!(right.iter().all(|s| s.normal.x > 0.0), "{:?}", right);
}

#[test]
fn red_on_both_sides_of_hue_wraparound() {
    let image = vertical_bars(100, 100, &[(20, 30, RED_LOW), (70, 80, RED_HIGH)]);
    let list = process(&narrow_dilation(), image);

    assert_eq!(list.count(SegmentColor::White), 0);
    assert_eq!(list.count(SegmentColor::Yellow), 0);
    let (low, high) = split_by_x(&list, SegmentColor::Red, 0.5);
    assert!(!low.is_empty(), "no segments on the low-hue bar");
    assert!(!high.is_empty(), "no segments on the high-hue bar");
}

#[test]
fn segments_are_grouped_by_color() {
    let image = vertical_bars(
        100,
        100,
        &[(10, 20, WHITE), (40, 50, YELLOW), (70, 80, RED_LOW)],
    );
    let list = process(&narrow_dilation(), image);

    let order: Vec<SegmentColor> = list.segments.iter().map(|s| s.color).collect();
    let mut sorted = order.clone();
    sorted.sort_by_key(|c| SegmentColor::ALL.iter().position(|x| x == c));
    assert_eq!(order, sorted);
    for color in SegmentColor::ALL {
        assert!(list.count(color) > 0, "missing {}", color);
    }
}

#[test]
fn top_cutoff_is_added_back() {
    let mut config = narrow_dilation();
    config.detection.top_cutoff = 50;
    let image = vertical_bars(100, 100, &[(40, 50, WHITE)]);
    let list = process(&config, image);

    assert!(list.count(SegmentColor::White) > 0);
    // Only the lower half of the frame is searched.
    for segment in &list.segments {
        for p in segment.pixels_normalized {
            assert!(p.y >= 0.5, "{:?}", segment);
        }
    }
    assert_in_unit_square(&list);
}

#[test]
fn larger_frames_are_resized() {
    // Same scene at twice the resolution gives segments in the same normalized place.
    let image = vertical_bars(200, 200, &[(80, 100, YELLOW)]);
    let list = process(&narrow_dilation(), image);

    assert!(list.count(SegmentColor::Yellow) > 0);
    for segment in &list.segments {
        let x = segment.pixels_normalized[0].x;
        assert!((0.35..=0.55).contains(&x), "{:?}", segment);
    }
}

#[test]
fn color_transform_changes_what_is_seen() {
    let config = square_config();
    let pipeline = pipeline_for(&config);
    pipeline.set_color_transform(ColorTransform {
        shift: [0.0; 3],
        scale: [0.3; 3],
    });
    // Darkened white falls below the white value threshold.
    let out = pipeline.process(Frame::now(diagonal_stripe())).unwrap();
    assert_eq!(out.segments.count(SegmentColor::White), 0);
}

#[test]
fn detection_is_reproducible() {
    let config = square_config();
    let a = process(&config, diagonal_stripe());
    let b = process(&config, diagonal_stripe());
    assert_eq!(a.segments, b.segments);
}
