//! Token counting for packed output.
//!
//! Uses tiktoken-rs for OpenAI-compatible counts and falls back to a
//! character heuristic when a tokenizer cannot be loaded. Counting the
//! original and the packed text of a file gives its [`Reduction`].

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Token encoding to use for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// cl100k_base: GPT-4, GPT-3.5-turbo
    #[default]
    Cl100kBase,
    /// o200k_base: GPT-4o
    O200kBase,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Cl100kBase => write!(f, "cl100k_base"),
            Encoding::O200kBase => write!(f, "o200k_base"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            _ => Err(format!("unknown encoding: {}", s)),
        }
    }
}

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    let cell = match encoding {
        Encoding::Cl100kBase => &CL100K,
        Encoding::O200kBase => &O200K,
    };
    cell.get_or_init(|| {
        let bpe = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        };
        bpe.map_err(|e| tracing::warn!("tokenizer {encoding} unavailable: {e}"))
            .ok()
    })
    .as_ref()
}

/// ~4 characters per token.
fn fallback_count(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Count tokens with the given encoding, never failing.
pub fn count_tokens(text: &str, encoding: Encoding) -> usize {
    match tokenizer(encoding) {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => fallback_count(text),
    }
}

/// Token counts of a file before and after packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reduction {
    pub original: usize,
    pub packed: usize,
}

impl Reduction {
    /// Count both texts. Identical texts are counted once.
    pub fn measure(original: &str, packed: &str, encoding: Encoding) -> Self {
        let original_tokens = count_tokens(original, encoding);
        let packed_tokens = if std::ptr::eq(original, packed) || original == packed {
            original_tokens
        } else {
            count_tokens(packed, encoding)
        };
        Self {
            original: original_tokens,
            packed: packed_tokens,
        }
    }

    /// Tokens saved by packing.
    pub fn saved(&self) -> usize {
        self.original.saturating_sub(self.packed)
    }

    /// Fraction of the original removed, in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.original == 0 {
            0.0
        } else {
            self.saved() as f64 / self.original as f64
        }
    }
}

impl std::ops::Add for Reduction {
    type Output = Reduction;

    fn add(self, rhs: Reduction) -> Reduction {
        Reduction {
            original: self.original + rhs.original,
            packed: self.packed + rhs.packed,
        }
    }
}

impl std::iter::Sum for Reduction {
    fn sum<I: Iterator<Item = Reduction>>(iter: I) -> Self {
        iter.fold(Reduction::default(), |a, b| a + b)
    }
}
