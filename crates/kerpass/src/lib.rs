//! The KerPass mutual-authentication credential system: a thin facade that
//! re-exports the public surface of the `kerpass-*` crates for downstream
//! consumers — an HTTP transport adapter for enrollment, CBOR/JSON envelope
//! marshallers, a CLI for test-vector generation, credential-store
//! persistence backends, logging glue, and the PKI certificate validator —
//! all of which are out of scope for this workspace (spec.md §1) but need
//! one coherent crate to depend on.

pub mod error {
    pub use kerpass_error::*;
}

pub mod registry {
    pub use kerpass_registry::*;
}

pub mod crypto {
    pub use kerpass_crypto::*;
}

pub mod noise {
    pub use kerpass_noise::*;
}

pub mod ephemsec {
    pub use kerpass_ephemsec::*;
}

pub mod session {
    pub use kerpass_session::*;
}

pub mod enroll {
    pub use kerpass_enroll::*;
}

pub mod challenge {
    pub use kerpass_challenge::*;
}

pub use kerpass_error::{Error, ErrorKind, Result};
