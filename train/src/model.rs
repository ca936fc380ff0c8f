//! The detection model interface and its adaptors.

use crate::{
    common::*,
    config::{ModelConfig, TorchScriptModelConfig},
    data::TargetTensors,
};
use derivative::Derivative;
use tch::{IValue, TrainableCModule};

/// Named scalar loss components in the order the model reports them.
pub type LossMap = IndexMap<String, Tensor>;

/// Sums all loss components into one scalar tensor.
pub fn total_loss(losses: &LossMap) -> Result<Tensor> {
    let mut values = losses.values();
    let first = values
        .next()
        .ok_or_else(|| format_err!("the model reported no loss components"))?;
    let total = values.fold(first.shallow_clone(), |sum, loss| sum + loss);
    Ok(total)
}

/// A detector that computes its own training loss.
///
/// Parameters live in the model's [nn::VarStore], which is also what the
/// optimizer is built from and what checkpoints are made of. Parameters are
/// placed on the var store's device when the model is constructed.
pub trait DetectionModel {
    /// Runs a forward pass in training mode and returns the loss components.
    fn forward_t(&mut self, images: &[Tensor], targets: &[TargetTensors]) -> Result<LossMap>;

    /// The device where the parameters reside.
    fn device(&self) -> Device;

    fn var_store(&self) -> &nn::VarStore;

    fn var_store_mut(&mut self) -> &mut nn::VarStore;
}

/// The generic model adaptor.
#[derive(Debug)]
pub enum Model {
    /// Model loaded from an exported TorchScript module.
    TorchScript(TorchScriptModel),
}

impl Model {
    /// Builds the model on the given device.
    pub fn new(config: &ModelConfig, device: Device) -> Result<Self> {
        match config {
            ModelConfig::TorchScript(TorchScriptModelConfig {
                module_file,
                num_classes,
            }) => {
                let model = TorchScriptModel::load(module_file, num_classes.get(), device)?;
                Ok(Self::TorchScript(model))
            }
        }
    }
}

impl DetectionModel for Model {
    fn forward_t(&mut self, images: &[Tensor], targets: &[TargetTensors]) -> Result<LossMap> {
        match self {
            Self::TorchScript(model) => model.forward_t(images, targets),
        }
    }

    fn device(&self) -> Device {
        match self {
            Self::TorchScript(model) => model.device(),
        }
    }

    fn var_store(&self) -> &nn::VarStore {
        match self {
            Self::TorchScript(model) => model.var_store(),
        }
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        match self {
            Self::TorchScript(model) => model.var_store_mut(),
        }
    }
}

/// A detector exported from torchvision as a TorchScript module.
///
/// In training mode the module maps `(List[Tensor], List[Dict[str, Tensor]])`
/// to either the loss dict or a `(losses, detections)` tuple, which is what
/// scripted torchvision detectors return.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TorchScriptModel {
    module_file: PathBuf,
    num_classes: usize,
    #[derivative(Debug = "ignore")]
    vs: nn::VarStore,
    #[derivative(Debug = "ignore")]
    module: TrainableCModule,
}

impl TorchScriptModel {
    pub fn load<P>(module_file: P, num_classes: usize, device: Device) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let module_file = module_file.as_ref().to_owned();
        let vs = nn::VarStore::new(device);
        let mut module = TrainableCModule::load(&module_file, vs.root()).with_context(|| {
            format!(
                "failed to load TorchScript module '{}'",
                module_file.display()
            )
        })?;
        module.set_train();

        let parameters = module.inner.named_parameters()?;
        check_num_classes(&parameters, num_classes).with_context(|| {
            format!(
                "the module '{}' does not match the configured classes",
                module_file.display()
            )
        })?;

        info!(
            "loaded {} with {} trainable variables for {} classes",
            module_file.display(),
            vs.trainable_variables().len(),
            num_classes
        );

        Ok(Self {
            module_file,
            num_classes,
            vs,
            module,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

impl DetectionModel for TorchScriptModel {
    fn forward_t(&mut self, images: &[Tensor], targets: &[TargetTensors]) -> Result<LossMap> {
        let images = IValue::TensorList(images.iter().map(|image| image.shallow_clone()).collect());
        let targets = encode_targets(targets);
        let output = self.module.forward_is(&[images, targets])?;
        parse_loss_output(output)
    }

    fn device(&self) -> Device {
        self.vs.device()
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

/// Encodes targets as the `List[Dict[str, Tensor]]` argument of torchvision
/// detectors, with `boxes` (float, `[N, 4]`) and `labels` (int64, `[N]`) keys.
pub fn encode_targets(targets: &[TargetTensors]) -> IValue {
    let dicts = targets
        .iter()
        .map(|target| {
            IValue::GenericDict(vec![
                (
                    IValue::String("boxes".into()),
                    IValue::Tensor(target.boxes.to_kind(Kind::Float)),
                ),
                (
                    IValue::String("labels".into()),
                    IValue::Tensor(target.labels.to_kind(Kind::Int64)),
                ),
            ])
        })
        .collect();
    IValue::GenericList(dicts)
}

/// Checks the configured class count against the width of the box classifier.
///
/// The classifier is the `cls_score.weight` parameter of torchvision's box
/// predictor, whose first dimension is the number of classes. Modules
/// without such a parameter are accepted with a warning.
pub fn check_num_classes(parameters: &[(String, Tensor)], num_classes: usize) -> Result<()> {
    let classifier = parameters
        .iter()
        .find(|(name, _)| name.ends_with("cls_score.weight"));

    let (name, weight) = match classifier {
        Some(classifier) => classifier,
        None => {
            warn!("no box classifier found in the module, skip the class count check");
            return Ok(());
        }
    };

    let width = weight.size().first().copied().unwrap_or(0);
    ensure!(
        width == num_classes as i64,
        "the box classifier '{}' predicts {} classes, but num_classes is {}",
        name,
        width,
        num_classes
    );
    Ok(())
}

/// Extracts the loss dict from a TorchScript detector output.
pub fn parse_loss_output(output: IValue) -> Result<LossMap> {
    let entries = match output {
        IValue::GenericDict(entries) => entries,
        IValue::Tuple(mut items) if !items.is_empty() => match items.swap_remove(0) {
            IValue::GenericDict(entries) => entries,
            other => bail!("expect a loss dict in the model output, but get {:?}", other),
        },
        other => bail!("expect a loss dict in the model output, but get {:?}", other),
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            (IValue::String(name), IValue::Tensor(loss)) => Ok((name, loss)),
            (key, value) => bail!(
                "expect a string to tensor entry in the loss dict, but get {:?}: {:?}",
                key,
                value
            ),
        })
        .try_collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn scalar(value: f64) -> Tensor {
        Tensor::from(value)
    }

    #[test]
    fn sum_loss_components() -> Result<()> {
        let losses: LossMap = vec![
            ("loss_a".to_owned(), scalar(1.5)),
            ("loss_b".to_owned(), scalar(2.5)),
        ]
        .into_iter()
        .collect();
        let total = f64::from(&total_loss(&losses)?);
        assert_abs_diff_eq!(total, 4.0);
        Ok(())
    }

    #[test]
    fn empty_loss_map_is_error() {
        assert!(total_loss(&LossMap::new()).is_err());
    }

    #[test]
    fn parse_scripted_detector_output() -> Result<()> {
        let losses = IValue::GenericDict(vec![
            (
                IValue::String("loss_classifier".into()),
                IValue::Tensor(scalar(0.5)),
            ),
            (
                IValue::String("loss_box_reg".into()),
                IValue::Tensor(scalar(0.25)),
            ),
        ]);
        let output = IValue::Tuple(vec![losses, IValue::GenericList(vec![])]);
        let losses = parse_loss_output(output)?;

        assert_eq!(
            losses.keys().collect::<Vec<_>>(),
            ["loss_classifier", "loss_box_reg"]
        );
        assert_abs_diff_eq!(f64::from(&total_loss(&losses)?), 0.75);
        Ok(())
    }

    #[test]
    fn encode_targets_as_dict_list() {
        let target = NormalizedTarget {
            labels: vec![2, 0],
            boxes: vec![[1, 2, 3, 4], [5, 6, 7, 8]],
        };
        let targets = vec![
            TargetTensors::from_normalized(&target),
            TargetTensors::from_normalized(&NormalizedTarget::default()),
        ];

        let dicts = match encode_targets(&targets) {
            IValue::GenericList(dicts) => dicts,
            other => panic!("expect a list, but get {:?}", other),
        };
        assert_eq!(dicts.len(), 2);

        let num_objects: Vec<i64> = dicts
            .iter()
            .map(|dict| {
                let entries = match dict {
                    IValue::GenericDict(entries) => entries,
                    other => panic!("expect a dict, but get {:?}", other),
                };
                let keys: Vec<&str> = entries
                    .iter()
                    .map(|(key, _)| match key {
                        IValue::String(key) => key.as_str(),
                        other => panic!("expect a string key, but get {:?}", other),
                    })
                    .collect();
                assert_eq!(keys, ["boxes", "labels"]);

                let (boxes, labels) = match (&entries[0].1, &entries[1].1) {
                    (IValue::Tensor(boxes), IValue::Tensor(labels)) => (boxes, labels),
                    other => panic!("expect tensor values, but get {:?}", other),
                };
                assert_eq!(boxes.kind(), Kind::Float);
                assert_eq!(labels.kind(), Kind::Int64);
                assert_eq!(boxes.size()[0], labels.size()[0]);
                assert_eq!(boxes.size()[1], 4);
                labels.size()[0]
            })
            .collect();
        assert_eq!(num_objects, [2, 0]);

        if let IValue::GenericDict(entries) = &dicts[0] {
            if let IValue::Tensor(labels) = &entries[1].1 {
                assert_eq!(Vec::<i64>::from(labels), [2, 0]);
            }
        }
    }

    #[test]
    fn class_count_matches_classifier_width() -> Result<()> {
        let parameters = vec![
            (
                "backbone.body.conv1.weight".to_owned(),
                Tensor::zeros(&[64, 3, 7, 7], (Kind::Float, Device::Cpu)),
            ),
            (
                "roi_heads.box_predictor.cls_score.weight".to_owned(),
                Tensor::zeros(&[21, 1024], (Kind::Float, Device::Cpu)),
            ),
        ];
        check_num_classes(&parameters, 21)?;
        assert!(check_num_classes(&parameters, 3).is_err());

        // nothing to compare with
        check_num_classes(&parameters[..1], 3)?;
        Ok(())
    }

    #[test]
    fn reject_non_dict_output() {
        let output = IValue::Tensor(scalar(1.0));
        assert!(parse_loss_output(output).is_err());

        let output = IValue::GenericDict(vec![(IValue::Int(0), IValue::Tensor(scalar(1.0)))]);
        assert!(parse_loss_output(output).is_err());
    }
}
