pub mod csr;
pub mod legacy;
pub mod mock;
pub mod pki;
pub mod provider;
pub mod types;

// Re-export key types
pub use csr::{parse_csr, CsrSubject};
pub use legacy::{LegacyFrontEnd, LegacyResponse};
pub use mock::{CaAuthority, MockCa};
pub use pki::{PkiConfig, PkiSigner};
pub use provider::{DefaultSignerFactory, Signer, SignerFactory};
pub use types::{IssuedCertificate, SignedCertificate};
