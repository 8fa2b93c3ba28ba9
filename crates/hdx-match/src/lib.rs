#![deny(unsafe_code)]

pub mod config;
pub mod pcode;
pub mod phonetic;
pub mod resolver;

pub use config::ResolverConfig;
pub use pcode::{conversion_candidates, convert_code_length, convert_country_code};
pub use phonetic::{PhoneticMatch, PhoneticMatcher, PrefixVariant, RefinedSoundex};
pub use resolver::AdminResolver;
