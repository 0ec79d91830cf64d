use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Result, VocabError};

pub const UNK: &str = "<unk>";
pub const PAD: &str = "<pad>";
pub const SOS: &str = "<sos>";
pub const EOS: &str = "<eos>";

/// Special tokens, in id order.
pub const SPECIALS: [&str; 4] = [UNK, PAD, SOS, EOS];

/// Bidirectional token <-> id mapping. Specials always occupy ids 0..4.
/// Persisted as the plain `token -> id` map; [`Vocab::load`] rebuilds the
/// reverse table.
#[derive(Debug, Clone)]
pub struct Vocab {
    pub token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
}

impl Vocab {
    /// A vocabulary holding only the special tokens.
    pub fn new() -> Self {
        let mut vocab = Self {
            token_to_id: HashMap::new(),
            id_to_token: Vec::new(),
        };
        for special in SPECIALS {
            vocab.push(special.to_string());
        }
        vocab
    }

    /// Appends `token` with the next free id, returning its id.
    pub fn push(&mut self, token: String) -> u32 {
        if let Some(&id) = self.token_to_id.get(&token) {
            return id;
        }
        let id = self.id_to_token.len() as u32;
        self.token_to_id.insert(token.clone(), id);
        self.id_to_token.push(token);
        id
    }

    pub fn get_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn get_token(&self, id: u32) -> Option<&String> {
        self.id_to_token.get(id as usize)
    }

    pub fn unk_id(&self) -> u32 {
        0
    }

    pub fn pad_id(&self) -> u32 {
        1
    }

    pub fn sos_id(&self) -> u32 {
        2
    }

    pub fn eos_id(&self) -> u32 {
        3
    }

    /// Maps tokens to ids, sending unknown tokens to `<unk>`.
    pub fn encode<'a, I>(&self, tokens: I) -> Vec<u32>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens
            .into_iter()
            .map(|t| self.get_id(t).unwrap_or(self.unk_id()))
            .collect()
    }

    /// Joins the tokens for `ids` with spaces. Ids outside the vocabulary
    /// are rendered as `<unk>`.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .map(|&id| self.get_token(id).map(String::as_str).unwrap_or(UNK))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.token_to_id)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let token_to_id: HashMap<String, u32> = serde_json::from_reader(reader)?;

        let mut entries: Vec<(u32, String)> = token_to_id
            .iter()
            .map(|(token, &id)| (id, token.clone()))
            .collect();
        entries.sort();

        let mut vocab = Self {
            token_to_id: HashMap::new(),
            id_to_token: Vec::with_capacity(entries.len()),
        };
        for (id, token) in entries {
            if id as usize != vocab.id_to_token.len() {
                return Err(VocabError::NonContiguousIds(id));
            }
            vocab.push(token);
        }

        for (id, special) in SPECIALS.iter().enumerate() {
            if vocab.get_id(special) != Some(id as u32) {
                return Err(VocabError::MissingSpecial(special));
            }
        }

        Ok(vocab)
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}
