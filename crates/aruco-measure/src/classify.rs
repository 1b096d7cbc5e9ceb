//! Produce classification through an ensemble of probability models.
//!
//! The networks themselves live outside this crate; a model only has to
//! implement [`ProbabilityModel`]. [`EnsembleClassifier`] is meant to be built
//! once at startup and reused for every request.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use std::fmt;

/// Input size `(width, height)` the ensemble members were trained on.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (64, 52);

/// Produce categories, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Produce {
    Apple,
    Banana,
    Eggplant,
    Lemon,
    Lulo,
    Mango,
    Papaya,
    Pear,
    Tomato,
    Zucchini,
}

impl Produce {
    pub const ALL: [Produce; 10] = [
        Produce::Apple,
        Produce::Banana,
        Produce::Eggplant,
        Produce::Lemon,
        Produce::Lulo,
        Produce::Mango,
        Produce::Papaya,
        Produce::Pear,
        Produce::Tomato,
        Produce::Zucchini,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display label shown to users.
    pub fn label(self) -> &'static str {
        match self {
            Produce::Apple => "Manzana",
            Produce::Banana => "Banana",
            Produce::Eggplant => "Berenjena",
            Produce::Lemon => "Limon",
            Produce::Lulo => "Lulo",
            Produce::Mango => "Mango",
            Produce::Papaya => "Papaya",
            Produce::Pear => "Pera",
            Produce::Tomato => "Tomate",
            Produce::Zucchini => "Calabacin",
        }
    }
}

impl fmt::Display for Produce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ClassifyError {
    #[error("ensemble has no models")]
    EmptyEnsemble,
    #[error("model {model} returned {got} probabilities (expected {expected})")]
    OutputLength {
        model: String,
        expected: usize,
        got: usize,
    },
    #[error("model {model} failed: {message}")]
    Model { model: String, message: String },
}

pub type ModelError = Box<dyn std::error::Error + Send + Sync>;

/// Anything that maps an image to a label.
pub trait Classifier {
    fn classify(&self, image: &DynamicImage) -> Result<Produce, ClassifyError>;
}

/// One pre-trained network including its own input preprocessing.
pub trait ProbabilityModel: Send + Sync {
    fn name(&self) -> &str;

    /// `(width, height)` the image is resized to before [`predict`](Self::predict).
    fn input_size(&self) -> (u32, u32) {
        DEFAULT_INPUT_SIZE
    }

    /// Class probabilities in [`Produce::ALL`] order.
    fn predict(&self, image: &RgbImage) -> Result<Vec<f32>, ModelError>;
}

/// Averages the probability vectors of its members and picks the argmax.
pub struct EnsembleClassifier {
    members: Vec<Box<dyn ProbabilityModel>>,
}

impl fmt::Debug for EnsembleClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.members.iter().map(|m| m.name()))
            .finish()
    }
}

impl EnsembleClassifier {
    pub fn new(members: Vec<Box<dyn ProbabilityModel>>) -> Result<Self, ClassifyError> {
        if members.is_empty() {
            return Err(ClassifyError::EmptyEnsemble);
        }
        log::info!(
            "ensemble ready: {}",
            members
                .iter()
                .map(|m| m.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Mean class probabilities over all members.
    pub fn probabilities(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassifyError> {
        let n = Produce::ALL.len();
        let mut sum = vec![0.0f32; n];
        for model in &self.members {
            let (w, h) = model.input_size();
            let input = image.resize_exact(w, h, FilterType::Nearest).to_rgb8();
            let probs = model.predict(&input).map_err(|e| ClassifyError::Model {
                model: model.name().to_string(),
                message: e.to_string(),
            })?;
            if probs.len() != n {
                return Err(ClassifyError::OutputLength {
                    model: model.name().to_string(),
                    expected: n,
                    got: probs.len(),
                });
            }
            for (acc, p) in sum.iter_mut().zip(probs) {
                *acc += p;
            }
        }
        let count = self.members.len() as f32;
        Ok(sum.into_iter().map(|s| s / count).collect())
    }
}

impl Classifier for EnsembleClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Produce, ClassifyError> {
        let probs = self.probabilities(image)?;
        // ties resolve to the lowest index
        let best = probs
            .iter()
            .enumerate()
            .fold(0, |best, (i, &p)| if p > probs[best] { i } else { best });
        let produce = Produce::from_index(best).unwrap_or(Produce::Apple);
        log::debug!("classified as {produce} ({:.3})", probs[best]);
        Ok(produce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        probs: Vec<f32>,
    }

    impl Fixed {
        fn boxed(name: &'static str, probs: Vec<f32>) -> Box<dyn ProbabilityModel> {
            Box::new(Self { name, probs })
        }
    }

    impl ProbabilityModel for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn predict(&self, image: &RgbImage) -> Result<Vec<f32>, ModelError> {
            assert_eq!(image.dimensions(), DEFAULT_INPUT_SIZE);
            Ok(self.probs.clone())
        }
    }

    struct Broken;

    impl ProbabilityModel for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn predict(&self, _image: &RgbImage) -> Result<Vec<f32>, ModelError> {
            Err("weights missing".into())
        }
    }

    fn one_hot(i: usize, p: f32) -> Vec<f32> {
        let mut v = vec![(1.0 - p) / 9.0; 10];
        v[i] = p;
        v
    }

    fn photo() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(320, 240))
    }

    #[test]
    fn averaged_probabilities_pick_the_consensus() {
        let ensemble = EnsembleClassifier::new(vec![
            Fixed::boxed("a", one_hot(1, 0.6)),
            Fixed::boxed("b", one_hot(8, 0.9)),
            Fixed::boxed("c", one_hot(8, 0.5)),
        ])
        .expect("ensemble");

        assert_eq!(ensemble.len(), 3);
        assert_eq!(ensemble.classify(&photo()).expect("classify"), Produce::Tomato);
        let probs = ensemble.probabilities(&photo()).expect("probs");
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn labels_follow_model_output_order() {
        assert_eq!(Produce::from_index(0), Some(Produce::Apple));
        assert_eq!(Produce::from_index(9).map(Produce::label), Some("Calabacin"));
        assert_eq!(Produce::from_index(10), None);
        assert_eq!(Produce::Eggplant.to_string(), "Berenjena");
    }

    #[test]
    fn empty_and_broken_ensembles_are_errors() {
        assert!(matches!(
            EnsembleClassifier::new(Vec::new()),
            Err(ClassifyError::EmptyEnsemble)
        ));

        let short = EnsembleClassifier::new(vec![Fixed::boxed("short", vec![1.0; 3])])
            .expect("ensemble");
        assert!(matches!(
            short.classify(&photo()),
            Err(ClassifyError::OutputLength { got: 3, expected: 10, .. })
        ));

        let members: Vec<Box<dyn ProbabilityModel>> = vec![Box::new(Broken)];
        let broken = EnsembleClassifier::new(members).expect("ensemble");
        match broken.classify(&photo()) {
            Err(ClassifyError::Model { model, message }) => {
                assert_eq!(model, "broken");
                assert_eq!(message, "weights missing");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
