mod pos_signature;

pub use pos_signature::{check_signature, PosSignature, PosSignatureService, SignatureError};
