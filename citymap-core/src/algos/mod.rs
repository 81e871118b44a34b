mod classifier;
mod compositor;
mod simplifier;

pub use classifier::ColorTable;
pub use compositor::DrawConfig;

pub(crate) use classifier::{BUILDING_KEY, FeatureClassifier, TAG_PRIORITY};
pub(crate) use compositor::LayerCompositor;
pub(crate) use simplifier::GeometrySimplifier;
