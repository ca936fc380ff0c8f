use crate::{common::*, LabelError};

/// The ordered list of class names.
///
/// The position of a name is its numeric label id. Names are unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ClassVocabulary {
    classes: IndexSet<String>,
}

impl ClassVocabulary {
    /// Builds a vocabulary from class names in label id order.
    pub fn new<I, S>(names: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes = IndexSet::new();

        for name in names {
            let name = name.into();
            if classes.contains(&name) {
                return Err(LabelError::DuplicateClass { name });
            }
            classes.insert(name);
        }

        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Gets the label id of a class name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.classes.get_index_of(name)
    }

    /// Gets the class name of a label id.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.classes.get_index(index).map(|name| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|name| name.as_str())
    }
}

impl PartialEq for ClassVocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.classes.iter().eq(other.classes.iter())
    }
}

impl Eq for ClassVocabulary {}

impl TryFrom<Vec<String>> for ClassVocabulary {
    type Error = LabelError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<ClassVocabulary> for Vec<String> {
    fn from(vocabulary: ClassVocabulary) -> Self {
        vocabulary.classes.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_id_is_position() -> Result<(), LabelError> {
        let vocabulary = ClassVocabulary::new(["background", "cat", "dog"])?;
        assert_eq!(vocabulary.len(), 3);
        assert_eq!(vocabulary.index_of("cat"), Some(1));
        assert_eq!(vocabulary.index_of("bird"), None);
        assert_eq!(vocabulary.name(2), Some("dog"));
        assert_eq!(vocabulary.name(3), None);
        Ok(())
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let err = ClassVocabulary::new(["cat", "dog", "cat"]).unwrap_err();
        assert_eq!(
            err,
            LabelError::DuplicateClass {
                name: "cat".into()
            }
        );
    }

    #[test]
    fn deserialize_from_list() {
        let vocabulary: ClassVocabulary = serde_json::from_str(r#"["cat", "dog"]"#).unwrap();
        assert_eq!(vocabulary.iter().collect::<Vec<_>>(), ["cat", "dog"]);

        let result: Result<ClassVocabulary, _> = serde_json::from_str(r#"["cat", "cat"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn equality_respects_order() -> Result<(), LabelError> {
        let lhs = ClassVocabulary::new(["cat", "dog"])?;
        let rhs = ClassVocabulary::new(["dog", "cat"])?;
        assert_ne!(lhs, rhs);
        assert_eq!(lhs, ClassVocabulary::new(["cat", "dog"])?);
        Ok(())
    }
}
