//! Built-in detection-to-object distance functions.
//!
//! Every function returns `f64::INFINITY` when the classes differ, so a
//! referee can never be associated with a player track.

use crate::detection::Detection;
use crate::tracked_object::TrackedObject;

/// IoU distance `1 - IoU` between the object's predicted box and the detection.
///
/// 0 for a perfect overlap, 1 for disjoint boxes.
pub fn iou(detection: &Detection, object: &TrackedObject) -> f64 {
    if detection.class != object.class {
        return f64::INFINITY;
    }
    1.0 - detection.bbox.iou(&object.estimate)
}

/// Euclidean distance between the box centres, in pixels.
pub fn centroid(detection: &Detection, object: &TrackedObject) -> f64 {
    if detection.class != object.class {
        return f64::INFINITY;
    }
    (detection.bbox.center() - object.estimate.center()).norm()
}

/// Centre distance normalized by the diagonal of the object's box.
///
/// Scale-invariant: players far from the camera have small boxes and move
/// fewer pixels per frame.
pub fn normalized_centroid(detection: &Detection, object: &TrackedObject) -> f64 {
    if detection.class != object.class {
        return f64::INFINITY;
    }
    let diagonal = object.estimate.width().hypot(object.estimate.height());
    if diagonal <= 0.0 {
        return f64::INFINITY;
    }
    centroid(detection, object) / diagonal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ObjectClass;
    use crate::utils::BBox;
    use approx::assert_relative_eq;

    fn detection(class: ObjectClass, bbox: BBox) -> Detection {
        Detection::new(class, bbox, 0.9).unwrap()
    }

    #[test]
    fn test_iou_distance() {
        let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
        let object = TrackedObject::for_tests(ObjectClass::Player, bbox);

        assert_relative_eq!(iou(&detection(ObjectClass::Player, bbox), &object), 0.0);
        assert_relative_eq!(
            iou(&detection(ObjectClass::Player, BBox::new(5.0, 0.0, 15.0, 10.0)), &object),
            2.0 / 3.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            iou(&detection(ObjectClass::Player, BBox::new(50.0, 50.0, 60.0, 60.0)), &object),
            1.0
        );
    }

    #[test]
    fn test_class_mismatch_is_infinite() {
        let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
        let object = TrackedObject::for_tests(ObjectClass::Player, bbox);
        let referee = detection(ObjectClass::Referee, bbox);

        assert!(iou(&referee, &object).is_infinite());
        assert!(centroid(&referee, &object).is_infinite());
        assert!(normalized_centroid(&referee, &object).is_infinite());
    }

    #[test]
    fn test_centroid_distances() {
        let object = TrackedObject::for_tests(ObjectClass::Player, BBox::new(0.0, 0.0, 30.0, 40.0));
        let det = detection(ObjectClass::Player, BBox::new(3.0, 4.0, 33.0, 44.0));

        assert_relative_eq!(centroid(&det, &object), 5.0);
        assert_relative_eq!(normalized_centroid(&det, &object), 0.1);
    }
}
