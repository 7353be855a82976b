// APU channels - the five sound generators
//
// Two pulse waves, a triangle, a noise generator, and the delta modulation
// channel. Each owns its timers and counters; the APU's frame sequencer
// and register file drive them.

mod dmc;
mod noise;
mod pulse;
mod triangle;

pub use dmc::Dmc;
pub use noise::Noise;
pub use pulse::Pulse;
pub use triangle::Triangle;
