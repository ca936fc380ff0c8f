//! Ground-truth annotations as they come out of the dataset files.

use crate::common::*;

/// The ground-truth objects of one image.
///
/// The field layout follows the PASCAL VOC annotation format, where each
/// object is listed as a repeated `<object>` element. Other elements are
/// ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawAnnotation {
    #[serde(default, rename = "object")]
    pub objects: Vec<RawObject>,
}

impl RawAnnotation {
    pub fn new(objects: Vec<RawObject>) -> Self {
        Self { objects }
    }
}

/// One annotated object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    pub name: String,
    pub bndbox: RawBndBox,
}

impl RawObject {
    /// Creates an object from a class name and `[xmin, ymin, xmax, ymax]` edges.
    pub fn new<S, C>(name: S, edges: [C; 4]) -> Self
    where
        S: Into<String>,
        C: Into<Coordinate>,
    {
        let [xmin, ymin, xmax, ymax] = edges;
        Self {
            name: name.into(),
            bndbox: RawBndBox {
                xmin: xmin.into(),
                ymin: ymin.into(),
                xmax: xmax.into(),
                ymax: ymax.into(),
            },
        }
    }
}

/// Bounding box given by its four edges in pixel units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBndBox {
    pub xmin: Coordinate,
    pub ymin: Coordinate,
    pub xmax: Coordinate,
    pub ymax: Coordinate,
}

impl RawBndBox {
    pub fn edges(&self) -> [(&'static str, &Coordinate); 4] {
        [
            ("xmin", &self.xmin),
            ("ymin", &self.ymin),
            ("xmax", &self.xmax),
            ("ymax", &self.ymax),
        ]
    }
}

/// A box coordinate in either numeric or textual form.
///
/// XML annotations always produce the [Coordinate::Text] variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Coordinate {
    /// Converts the coordinate to an integer pixel position.
    ///
    /// Text must be a decimal integer. Float values are truncated toward
    /// zero. It returns `None` for any other text, and for floats that are
    /// not finite or do not fit in `i64`.
    pub fn to_pixel(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Float(value) => float_to_pixel(*value),
            Self::Text(text) => text.trim().parse::<i64>().ok(),
        }
    }
}

fn float_to_pixel(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    cast::<f64, i64>(value.trunc())
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
            Self::Text(text) => write!(f, "{:?}", text),
        }
    }
}

impl From<i64> for Coordinate {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Coordinate {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Coordinate {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_to_pixel() {
        assert_eq!(Coordinate::from(7).to_pixel(), Some(7));
        assert_eq!(Coordinate::from(" 42 ").to_pixel(), Some(42));
        assert_eq!(Coordinate::from("273.5").to_pixel(), None);
        assert_eq!(Coordinate::from(273.5).to_pixel(), Some(273));
        assert_eq!(Coordinate::from("-3").to_pixel(), Some(-3));
        assert_eq!(Coordinate::from(-0.5).to_pixel(), Some(0));
        assert_eq!(Coordinate::from("abc").to_pixel(), None);
        assert_eq!(Coordinate::from("").to_pixel(), None);
        assert_eq!(Coordinate::from("NaN").to_pixel(), None);
        assert_eq!(Coordinate::from(f64::INFINITY).to_pixel(), None);
        assert_eq!(Coordinate::from(1e300).to_pixel(), None);
    }

    #[test]
    fn deserialize_json_annotation() {
        let text = r#"{
            "object": [
                { "name": "dog", "bndbox": { "xmin": "1", "ymin": 2, "xmax": 3.0, "ymax": "4" } }
            ]
        }"#;
        let annotation: RawAnnotation = serde_json::from_str(text).unwrap();
        assert_eq!(annotation.objects.len(), 1);

        let bndbox = &annotation.objects[0].bndbox;
        assert_eq!(bndbox.xmin, Coordinate::Text("1".into()));
        assert_eq!(bndbox.ymin, Coordinate::Integer(2));
        assert_eq!(bndbox.xmax, Coordinate::Float(3.0));
    }

    #[test]
    fn missing_objects_means_unannotated() {
        let annotation: RawAnnotation = serde_json::from_str("{}").unwrap();
        assert!(annotation.objects.is_empty());
    }
}
