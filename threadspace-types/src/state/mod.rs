mod effect;
mod instance;
mod modulator;

pub use effect::EffectKind;
pub use instance::{InstanceState, DEFAULT_MODULATION_DEPTH};
pub use modulator::ModulatorKind;
