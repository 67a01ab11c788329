//! Gradflip core library: gradient-guided targeted edge-flip attacks on graph
//! node classifiers.
//!
//! The entry point is [`FgaBuilder`], which validates configuration and
//! produces an [`Fga`] driving a [`GradientOracle`] such as [`LinearGcn`].
#![cfg_attr(docsrs, feature(doc_cfg))]

mod builder;
mod error;
mod fga;
mod matrix;
mod normalize;
mod oracle;
mod report;
mod selector;
mod sparse;
mod surrogate;
#[cfg(test)]
mod test_utils;
mod validate;

pub use crate::{
    builder::{Device, FgaBuilder, FlipPolicy},
    error::{
        AdjacencyViolation, AdjacencyViolationCode, AttackError, AttackErrorCode,
        AttackErrorKind, MatrixError, MatrixErrorCode, OracleError, OracleErrorCode, Result,
    },
    fga::Fga,
    matrix::DenseMatrix,
    normalize::{inverse_sqrt_degrees, normalize_adjacency},
    oracle::{GradientOracle, GradientQuery},
    report::{AttackReport, EdgeFlip, FlipKind},
    selector::{GreedySelector, Selection},
    sparse::CsrMatrix,
    surrogate::{LinearGcn, nll_loss},
    validate::validate_adjacency,
};
