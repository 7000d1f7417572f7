// Context sampling
//
// The policy manager owns the only system probe. Producers never touch the OS;
// they read the cached context the sampler hands out.

mod error_rate;
mod probe;
mod sampler;

pub use error_rate::ErrorRateWindow;
pub use probe::{ScriptedProbe, StaticProbe, SysinfoProbe, SystemProbe};
pub use sampler::{ContextSampler, SamplerConfig};
