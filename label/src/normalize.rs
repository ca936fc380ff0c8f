//! Conversion from raw annotations to numeric labels and boxes.

use crate::{common::*, ClassVocabulary, LabelError, RawAnnotation, RawObject};
use std::sync::Arc;

/// The numeric targets of one image.
///
/// `labels[i]` is the label id of the object whose box is `boxes[i]`. Boxes
/// are stored as `[xmin, ymin, xmax, ymax]` in pixel units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedTarget {
    pub labels: Vec<i64>,
    pub boxes: Vec<[i64; 4]>,
}

impl NormalizedTarget {
    /// The number of objects.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.labels.len(), self.boxes.len());
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Maps class names to label ids and parses box coordinates.
#[derive(Debug, Clone)]
pub struct Normalizer {
    vocabulary: Arc<ClassVocabulary>,
}

impl Normalizer {
    pub fn new(vocabulary: impl Into<Arc<ClassVocabulary>>) -> Self {
        Self {
            vocabulary: vocabulary.into(),
        }
    }

    pub fn vocabulary(&self) -> &ClassVocabulary {
        &self.vocabulary
    }

    /// Normalizes the objects of one image, keeping their order.
    ///
    /// The first offending object fails the whole annotation.
    pub fn normalize(&self, annotation: &RawAnnotation) -> Result<NormalizedTarget, LabelError> {
        let pairs: Vec<(i64, [i64; 4])> = annotation
            .objects
            .iter()
            .enumerate()
            .map(|(index, object)| self.normalize_object(index, object))
            .collect::<Result<_, _>>()?;
        let (labels, boxes) = pairs.into_iter().unzip();

        Ok(NormalizedTarget { labels, boxes })
    }

    fn normalize_object(
        &self,
        index: usize,
        object: &RawObject,
    ) -> Result<(i64, [i64; 4]), LabelError> {
        let class_id = self
            .vocabulary
            .index_of(&object.name)
            .ok_or_else(|| LabelError::UnknownClass {
                object: index,
                name: object.name.clone(),
            })?;

        let mut edges = [0i64; 4];
        for (slot, (field, coord)) in edges.iter_mut().zip(object.bndbox.edges()) {
            *slot = coord
                .to_pixel()
                .ok_or_else(|| LabelError::MalformedAnnotation {
                    object: index,
                    reason: format!("{} = {} is not a number", field, coord),
                })?;
        }

        Ok((class_id as i64, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cat_dog() -> Normalizer {
        Normalizer::new(ClassVocabulary::new(["cat", "dog"]).unwrap())
    }

    #[test]
    fn labels_follow_vocabulary_positions() -> Result<(), LabelError> {
        let annotation = RawAnnotation::new(vec![
            RawObject::new("dog", ["1", "2", "3", "4"]),
            RawObject::new("cat", ["5", "6", "7", "8"]),
        ]);
        let target = cat_dog().normalize(&annotation)?;

        assert_eq!(target.labels, vec![1, 0]);
        assert_eq!(target.boxes, vec![[1, 2, 3, 4], [5, 6, 7, 8]]);
        Ok(())
    }

    #[test]
    fn unannotated_image_yields_empty_target() -> Result<(), LabelError> {
        let target = cat_dog().normalize(&RawAnnotation::default())?;
        assert!(target.labels.is_empty());
        assert!(target.boxes.is_empty());
        assert!(target.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_class_fails_whole_annotation() {
        let annotation = RawAnnotation::new(vec![
            RawObject::new("cat", [1, 2, 3, 4]),
            RawObject::new("bird", [1, 2, 3, 4]),
        ]);
        let err = cat_dog().normalize(&annotation).unwrap_err();
        assert_eq!(
            err,
            LabelError::UnknownClass {
                object: 1,
                name: "bird".into()
            }
        );
    }

    #[test]
    fn non_numeric_coordinate_is_malformed() {
        let annotation = RawAnnotation::new(vec![RawObject::new("cat", ["1", "two", "3", "4"])]);
        let err = cat_dog().normalize(&annotation).unwrap_err();
        assert!(matches!(
            err,
            LabelError::MalformedAnnotation { object: 0, .. }
        ));
        assert!(err.to_string().contains("ymin"));
    }

    #[test]
    fn inverted_box_passes_through() -> Result<(), LabelError> {
        let annotation = RawAnnotation::new(vec![RawObject::new("dog", ["10", "2", "3", "4"])]);
        let target = cat_dog().normalize(&annotation)?;
        assert_eq!(target.labels, vec![1]);
        assert_eq!(target.boxes, vec![[10, 2, 3, 4]]);
        Ok(())
    }

    #[test]
    fn decimal_text_coordinate_is_malformed() {
        let annotation = RawAnnotation::new(vec![RawObject::new("cat", ["1.7", "2", "3", "4"])]);
        let err = cat_dog().normalize(&annotation).unwrap_err();
        assert!(matches!(
            err,
            LabelError::MalformedAnnotation { object: 0, .. }
        ));
        assert!(err.to_string().contains("xmin"));
    }

    fn arb_object() -> impl Strategy<Value = RawObject> {
        (
            prop::sample::select(vec!["cat", "dog"]),
            -1000i64..1000,
            -1000i64..1000,
            -1000i64..1000,
            -1000i64..1000,
        )
            .prop_map(|(name, x1, y1, x2, y2)| {
                let edges = [x1, y1, x2, y2].map(|value| value.to_string());
                RawObject::new(name, edges)
            })
    }

    proptest! {
        #[test]
        fn labels_and_boxes_match_object_count(objects in prop::collection::vec(arb_object(), 0..32)) {
            let num_objects = objects.len();
            let target = cat_dog().normalize(&RawAnnotation::new(objects.clone())).unwrap();

            prop_assert_eq!(target.labels.len(), num_objects);
            prop_assert_eq!(target.boxes.len(), num_objects);

            for ((label, bbox), object) in target.labels.iter().zip(&target.boxes).zip(&objects) {
                let expect_label = if object.name == "cat" { 0 } else { 1 };
                prop_assert_eq!(*label, expect_label);
                let expect_box = object.bndbox.edges().map(|(_, coord)| coord.to_pixel().unwrap());
                prop_assert_eq!(*bbox, expect_box);
            }
        }
    }
}
