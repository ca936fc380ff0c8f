use super::*;
use crate::common::*;
use label::{RawBndBox, RawObject};

/// The PASCAL VOC dataset read from a local directory.
///
/// Sample ids come from `ImageSets/Main/<split>.txt`. Annotations and
/// images are read on demand from `Annotations/<id>.xml` and
/// `JPEGImages/<id>.jpg`.
#[derive(Debug, Clone)]
pub struct VocDataset {
    root: PathBuf,
    split: String,
    ids: Vec<String>,
    transform: ImageTransform,
}

impl VocDataset {
    pub async fn load<P>(root: P, split: &str, transform: ImageTransform) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let root = root.as_ref().to_owned();
        let list_file = root
            .join("ImageSets")
            .join("Main")
            .join(format!("{}.txt", split));
        let text = tokio::fs::read_to_string(&list_file)
            .await
            .with_context(|| format!("failed to read image set file '{}'", list_file.display()))?;

        // per-class lists carry a second column, which is ignored
        let ids: Vec<String> = text
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|id| id.to_owned())
            .collect();

        Ok(Self {
            root,
            split: split.to_owned(),
            ids,
            transform,
        })
    }

    pub fn split(&self) -> &str {
        &self.split
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn image_path(&self, id: &str) -> PathBuf {
        self.root.join("JPEGImages").join(format!("{}.jpg", id))
    }

    pub fn annotation_path(&self, id: &str) -> PathBuf {
        self.root.join("Annotations").join(format!("{}.xml", id))
    }

    pub fn load_annotation(&self, id: &str) -> Result<RawAnnotation> {
        let path = self.annotation_path(id);
        let xml_content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read annotation file '{}'", path.display()))?;
        parse_voc_annotation(&xml_content)
            .with_context(|| format!("failed to parse annotation file '{}'", path.display()))
    }
}

impl RandomAccessDataset for VocDataset {
    fn num_records(&self) -> usize {
        self.ids.len()
    }

    fn nth(&self, index: usize) -> Result<(Tensor, RawAnnotation)> {
        let id = self.ids.get(index).ok_or_else(|| {
            format_err!(
                "record index {} is out of range, the dataset has {} records",
                index,
                self.ids.len()
            )
        })?;
        let image = self.transform.load(self.image_path(id))?;
        let annotation = self.load_annotation(id)?;
        Ok((image, annotation))
    }
}

/// Parses the content of a VOC annotation XML file.
pub fn parse_voc_annotation(xml_content: &str) -> Result<RawAnnotation> {
    let annotation: xml::Annotation = serde_xml_rs::from_str(xml_content)?;
    Ok(annotation.into())
}

mod xml {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub struct Annotation {
        #[serde(default)]
        pub object: Vec<Object>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Object {
        pub name: String,
        pub bndbox: BndBox,
    }

    #[derive(Debug, Deserialize)]
    pub struct BndBox {
        pub xmin: String,
        pub ymin: String,
        pub xmax: String,
        pub ymax: String,
    }

    impl From<Annotation> for RawAnnotation {
        fn from(annotation: Annotation) -> Self {
            let objects = annotation
                .object
                .into_iter()
                .map(|object| {
                    let Object { name, bndbox } = object;
                    let BndBox {
                        xmin,
                        ymin,
                        xmax,
                        ymax,
                    } = bndbox;

                    RawObject {
                        name: name.trim().to_owned(),
                        bndbox: RawBndBox {
                            xmin: xmin.into(),
                            ymin: ymin.into(),
                            xmax: xmax.into(),
                            ymax: ymax.into(),
                        },
                    }
                })
                .collect();
            RawAnnotation::new(objects)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use label::Coordinate;

    const ANNOTATION: &str = r#"<annotation>
	<folder>VOC2007</folder>
	<filename>000005.jpg</filename>
	<size>
		<width>500</width>
		<height>375</height>
		<depth>3</depth>
	</size>
	<segmented>0</segmented>
	<object>
		<name>chair</name>
		<pose>Rear</pose>
		<truncated>0</truncated>
		<difficult>0</difficult>
		<bndbox>
			<xmin>263</xmin>
			<ymin>211</ymin>
			<xmax>324</xmax>
			<ymax>339</ymax>
		</bndbox>
	</object>
	<object>
		<name>dog</name>
		<pose>Unspecified</pose>
		<truncated>1</truncated>
		<difficult>0</difficult>
		<bndbox>
			<xmin>5</xmin>
			<ymin>6</ymin>
			<xmax>7</xmax>
			<ymax>8</ymax>
		</bndbox>
	</object>
</annotation>"#;

    #[test]
    fn parse_annotation_xml() -> Result<()> {
        let annotation = parse_voc_annotation(ANNOTATION)?;
        assert_eq!(annotation.objects.len(), 2);

        let chair = &annotation.objects[0];
        assert_eq!(chair.name, "chair");
        assert_eq!(chair.bndbox.xmin, Coordinate::Text("263".into()));
        assert_eq!(chair.bndbox.ymax, Coordinate::Text("339".into()));
        assert_eq!(annotation.objects[1].name, "dog");
        Ok(())
    }

    #[test]
    fn parse_unannotated_xml() -> Result<()> {
        let xml_content = "<annotation><filename>000001.jpg</filename></annotation>";
        let annotation = parse_voc_annotation(xml_content)?;
        assert!(annotation.objects.is_empty());
        Ok(())
    }

    #[test]
    fn normalize_parsed_annotation() -> Result<()> {
        let vocabulary = ClassVocabulary::new(["chair", "dog"])?;
        let target = Normalizer::new(vocabulary).normalize(&parse_voc_annotation(ANNOTATION)?)?;
        assert_eq!(target.labels, [0, 1]);
        assert_eq!(target.boxes, [[263, 211, 324, 339], [5, 6, 7, 8]]);
        Ok(())
    }

    #[test]
    fn decimal_xml_coordinate_fails_normalization() -> Result<()> {
        let xml_content = "<annotation><object><name>dog</name>\
            <bndbox><xmin>1.5</xmin><ymin>2</ymin><xmax>3</xmax><ymax>4</ymax></bndbox>\
            </object></annotation>";
        let annotation = parse_voc_annotation(xml_content)?;
        let vocabulary = ClassVocabulary::new(["chair", "dog"])?;
        let err = Normalizer::new(vocabulary)
            .normalize(&annotation)
            .unwrap_err();
        assert!(matches!(
            err,
            LabelError::MalformedAnnotation { object: 0, .. }
        ));
        Ok(())
    }
}
