mod fsm;
mod lg2;
mod lzp;
mod model;

pub(crate) use lzp::{Lzp, RangeDecoder, RangeEncoder};
