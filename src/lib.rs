//! # Skribi (Blogging backend)
//!
//! `skribi` is a small blogging service: user signup and login with bcrypt
//! password hashing and JWT issuance, and blog-post CRUD scoped to an owning
//! user, with image upload to local disk or a cloud image host.
//!
//! ## Ownership model
//!
//! Every blog post records the id of the user that created it. Ownership is
//! enforced at the service boundary: only the owner may delete a post. Legacy
//! rows may carry no owner; those posts cannot be deleted by anyone.
//!
//! ## Authentication
//!
//! Clients present the token returned by `/api/auth/createuser` or
//! `/api/auth/login` in the `auth-token` header. Tokens are HS256 JWTs signed
//! with a process-wide secret and carry the authenticated user id.

pub mod cli;
pub mod skribi;
