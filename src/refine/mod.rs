//! Sub-sample peak refinement.
//!
//! `quad1d`/`quad2d` fit parabolas to sampled responses (orientation
//! histograms, dense corner maps); `newton` refines scale-space extrema with a
//! full 3D quadratic model.

pub mod newton;
pub mod quad1d;
pub mod quad2d;
