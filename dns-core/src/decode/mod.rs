//! C1: decoders which turn a queried name into a synthesized answer.
//!
//! Every decoder here takes the already-lowercased, trailing-dot-stripped
//! name (normalisation happens once, in `crate::resolver`) and returns
//! `None` for "not applicable" rather than an error: a name failing to
//! decode is not a fault, it's just not this decoder's business.

pub mod base32;
pub mod json_name;
pub mod reflect;
