pub mod constraints;
pub mod credential;
pub mod crypto;
pub mod object;
pub mod preset;
pub mod request;
pub mod response;
pub mod rp_signature;
pub mod util;
