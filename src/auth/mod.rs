//! JWT authentication: claims shape and the decode/validate path shared by
//! the HTTP middleware and the socket handshake.

mod claims;
mod jwt;

pub use claims::Claims;
pub use jwt::JwtValidator;
