//! Known corps, as offered by the frontend pickers.
//!
//! Membership is stored as free text and is not checked against this list.

pub const PREDEFINED_CORPS: &[&str] = &[
    "SET SINTEL",
    "SOPS",
    "SPERS",
    "SLOG",
    "SRENA",
    "SPOTMAR",
    "DISPOTMAR",
    "DISKUM",
    "DISMINPERS",
    "DISKES",
    "DISFASLAN",
    "DISHARKAN",
    "DISBEK",
    "DISANG",
    "DENMA",
    "KUWIL",
    "AKUN SATKOM",
    "DISSYAHAL",
    "RUMKIT",
    "FASHARKAN",
    "TIM INTEL",
    "DISPEN",
    "POMAL",
];
