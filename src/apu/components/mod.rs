// APU components - the sub-units shared between channels
//
// Each channel is assembled from these pieces: a period timer, a length
// counter, and per-channel extras (envelope, sweep, linear counter). The
// frame sequencer in the APU proper decides when each one ticks.

mod envelope;
mod length_counter;
mod linear_counter;
mod sweep;
mod timer;

pub use envelope::Envelope;
pub use length_counter::LengthCounter;
pub use linear_counter::LinearCounter;
pub use sweep::Sweep;
pub use timer::Timer;
