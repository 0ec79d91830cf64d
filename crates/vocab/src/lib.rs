pub mod error;
pub mod vocab;
pub mod pre_tokenize;
pub mod builder;

pub use builder::VocabBuilder;
pub use error::VocabError;
pub use pre_tokenize::tokenize;
pub use vocab::{Vocab, EOS, PAD, SOS, UNK};
