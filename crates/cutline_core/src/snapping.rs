use crate::timeline::Timeline;
use crate::types::ItemId;

/// Find the nearest snap point within the threshold.
/// Returns the snapped frame if within threshold, otherwise the original frame.
pub fn find_snap_point(frame: i64, snap_points: &[i64], threshold: i64) -> i64 {
    let mut best = frame;
    let mut best_dist = threshold + 1; // start beyond threshold

    for &point in snap_points {
        let dist = (frame - point).abs();
        if dist < best_dist {
            best = point;
            best_dist = dist;
        }
    }

    if best_dist <= threshold {
        best
    } else {
        frame
    }
}

/// Collect all snap points from a timeline (item edges, guides, cursor), in
/// frames.
pub fn collect_snap_points(timeline: &Timeline, exclude: &[ItemId], cursor: Option<i64>) -> Vec<i64> {
    let fps = timeline.fps();
    let mut points = vec![0];

    for item in timeline.items() {
        if exclude.contains(&item.id()) {
            continue;
        }
        let info = item.info();
        points.push(info.start_pos.frames(fps));
        points.push(info.end_pos.frames(fps));
    }

    points.extend(timeline.guides.iter().map(|g| g.time.frames(fps)));
    points.extend(cursor);

    points.sort_unstable();
    points.dedup();
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{ClipItem, ClipSource};
    use crate::time::GenTime;
    use crate::timeline::TimelineItem;
    use crate::types::*;

    const FPS: f64 = 25.0;

    fn make_timeline_with_clips() -> (Timeline, ItemId) {
        let mut timeline = Timeline::with_tracks(FPS, vec![TrackInfo::video("V1")]);
        let mut first = None;
        for (start, end) in [(25, 100), (125, 175)] {
            let clip = ClipItem::new(
                ClipSource::new("src", ClipType::Video, GenTime::from_seconds(60.0)),
                &ItemInfo::new(
                    GenTime::from_frames(start, FPS),
                    GenTime::from_frames(end, FPS),
                    GenTime::ZERO,
                    0,
                ),
                FPS,
            );
            first.get_or_insert(clip.id());
            timeline.insert_item(TimelineItem::Clip(clip));
        }
        timeline.guides.push(Guide {
            time: GenTime::from_frames(250, FPS),
            comment: "chorus".to_string(),
        });
        (timeline, first.unwrap())
    }

    #[test]
    fn snap_to_nearest_point() {
        let points = vec![0, 25, 125];
        assert_eq!(find_snap_point(28, &points, 5), 25);
    }

    #[test]
    fn no_snap_beyond_threshold() {
        let points = vec![0, 25, 125];
        assert_eq!(find_snap_point(75, &points, 5), 75);
    }

    #[test]
    fn snap_to_closest_of_two() {
        let points = vec![25, 50];
        assert_eq!(find_snap_point(35, &points, 15), 25);
        assert_eq!(find_snap_point(42, &points, 15), 50);
    }

    #[test]
    fn empty_snap_points_returns_original() {
        assert_eq!(find_snap_point(50, &[], 10), 50);
    }

    #[test]
    fn collect_snap_points_from_timeline() {
        let (timeline, _) = make_timeline_with_clips();
        let points = collect_snap_points(&timeline, &[], Some(60));
        assert_eq!(points, vec![0, 25, 60, 100, 125, 175, 250]);
    }

    #[test]
    fn collect_excludes_item() {
        let (timeline, first) = make_timeline_with_clips();
        let points = collect_snap_points(&timeline, &[first], None);
        assert!(!points.contains(&25));
        assert!(!points.contains(&100));
        assert!(points.contains(&125));
        assert!(points.contains(&0));
    }
}
