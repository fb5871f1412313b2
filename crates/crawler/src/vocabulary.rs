// ABOUTME: Shared term tables: synonym canonicalization, domain vocabulary, ecosystems, stop words.
// ABOUTME: The normalizer, the tag extractor, and semantic search all read from these tables.

//! Term tables shared across the pipeline.
//!
//! Content and tags must agree on terminology, so the synonym table is
//! applied by [`canonicalize`] in both the normalizer and the tag
//! extractor. The ecosystem table maps specific technical terms onto a
//! small set of topic-cluster labels and is used by tagging and by
//! semantic search alike.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// An abbreviation and its expansion, collapsed to one canonical form.
#[derive(Debug, Clone, Copy)]
pub struct Synonym {
    pub full: &'static str,
    pub abbr: &'static str,
}

impl Synonym {
    /// The canonical "Full Name (ABBR)" rendering.
    pub fn canonical(&self) -> String {
        format!("{} ({})", self.full, self.abbr)
    }
}

pub const SYNONYMS: &[Synonym] = &[
    Synonym { full: "Bitcoin Improvement Proposal", abbr: "BIP" },
    Synonym { full: "Lightning Network", abbr: "LN" },
    Synonym { full: "Unspent Transaction Output", abbr: "UTXO" },
    Synonym { full: "Partially Signed Bitcoin Transaction", abbr: "PSBT" },
    Synonym { full: "Non-Fungible Token", abbr: "NFT" },
    Synonym { full: "Decentralized Finance", abbr: "DeFi" },
    Synonym { full: "Proof of Work", abbr: "PoW" },
    Synonym { full: "Proof of Stake", abbr: "PoS" },
    Synonym { full: "Nostr Implementation Possibility", abbr: "NIP" },
    Synonym { full: "Large Language Model", abbr: "LLM" },
    Synonym { full: "Retrieval-Augmented Generation", abbr: "RAG" },
];

static SYNONYM_PATTERNS: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    SYNONYMS
        .iter()
        .map(|syn| {
            let canonical = syn.canonical();
            // Canonical form first, in any case, so it is never expanded twice.
            let pattern = format!(
                r"(?i:{})|\b(?:(?i:{})|{})\b",
                regex::escape(&canonical),
                regex::escape(syn.full),
                regex::escape(syn.abbr)
            );
            let re = Regex::new(&pattern).expect("synonym pattern must compile");
            (re, canonical)
        })
        .collect()
});

/// Rewrite every known abbreviation or expansion to its canonical form.
///
/// Idempotent: canonicalizing canonical text returns it unchanged.
pub fn canonicalize(text: &str) -> String {
    let mut out = text.to_string();
    for (re, canonical) in SYNONYM_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, canonical.as_str()).into_owned();
        }
    }
    out
}

/// Fixed domain vocabulary, in tag form. Hyphens match a space or a hyphen.
pub const DOMAIN_TERMS: &[&str] = &[
    "bitcoin",
    "lightning",
    "wallet",
    "nostr",
    "ethereum",
    "blockchain",
    "cryptocurrency",
    "mining",
    "node",
    "exchange",
    "privacy",
    "security",
    "self-custody",
    "open-source",
    "payments",
    "hardware-wallet",
    "multisig",
    "defi",
    "nft",
    "api",
    "sdk",
    "documentation",
    "tutorial",
    "research",
    "podcast",
    "newsletter",
    "conference",
    "education",
    "developer",
    "ai",
    "machine-learning",
];

static DOMAIN_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    DOMAIN_TERMS
        .iter()
        .map(|term| {
            let body = term
                .split('-')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"[\s\-]");
            let re = Regex::new(&format!(r"(?i)\b{}\b", body)).expect("domain term must compile");
            (*term, re)
        })
        .collect()
});

/// Domain terms present in `text`, in vocabulary order.
pub fn domain_terms_in(text: &str) -> Vec<&'static str> {
    DOMAIN_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(term, _)| *term)
        .collect()
}

/// Many-to-one mapping of technical terms onto ecosystem labels.
pub const ECOSYSTEMS: &[(&str, &str)] = &[
    ("bitcoin", "bitcoin"),
    ("btc", "bitcoin"),
    ("satoshi", "bitcoin"),
    ("sats", "bitcoin"),
    ("segwit", "bitcoin"),
    ("taproot", "bitcoin"),
    ("utxo", "bitcoin"),
    ("psbt", "bitcoin"),
    ("miniscript", "bitcoin"),
    ("bip", "bitcoin"),
    ("lightning", "lightning"),
    ("lnd", "lightning"),
    ("lnurl", "lightning"),
    ("bolt11", "lightning"),
    ("bolt12", "lightning"),
    ("ln", "lightning"),
    ("nostr", "nostr"),
    ("npub", "nostr"),
    ("nsec", "nostr"),
    ("nip", "nostr"),
    ("zaps", "nostr"),
    ("ethereum", "ethereum"),
    ("eth", "ethereum"),
    ("solidity", "ethereum"),
    ("evm", "ethereum"),
    ("metamask", "ethereum"),
    ("erc20", "ethereum"),
    ("llm", "ai"),
    ("gpt", "ai"),
    ("pytorch", "ai"),
    ("tensorflow", "ai"),
    ("transformer", "ai"),
    ("embeddings", "ai"),
    ("rag", "ai"),
    ("rust", "rust"),
    ("cargo", "rust"),
    ("rustc", "rust"),
    ("javascript", "javascript"),
    ("typescript", "javascript"),
    ("npm", "javascript"),
    ("nodejs", "javascript"),
    ("react", "javascript"),
    ("python", "python"),
    ("pypi", "python"),
    ("django", "python"),
];

/// Lowercase alphanumeric tokens of `text`.
pub fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ecosystem labels implied by `text`, each once, in table order.
pub fn ecosystems_in(text: &str) -> Vec<&'static str> {
    let toks = tokens(text);
    let mut out: Vec<&'static str> = Vec::new();
    for (term, label) in ECOSYSTEMS {
        if toks.contains(*term) && !out.contains(label) {
            out.push(label);
        }
    }
    out
}

/// Brand and product names whose internal capitals are not word boundaries.
pub const PRESERVED_CASING: &[&str] = &[
    "GitHub", "GitLab", "JavaScript", "TypeScript", "YouTube", "LinkedIn", "WordPress",
    "PayPal", "MetaMask", "OpenAI", "ChatGPT", "OpenSSL", "PostgreSQL", "MySQL", "MongoDB",
    "GraphQL", "WebSocket", "iPhone", "iPad", "macOS", "iOS", "BTCPay", "CoinJoin", "PayJoin",
    "DeFi", "PoW", "PoS", "TikTok", "StackOverflow", "NodeJS", "DuckDuckGo", "BlueWallet",
    "WalletConnect", "LangChain", "HuggingFace", "PyTorch", "TensorFlow",
];

static PRESERVED_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| PRESERVED_CASING.iter().copied().collect());

/// True if `word`, stripped of surrounding punctuation, is a protected brand spelling.
pub fn is_preserved(word: &str) -> bool {
    let core = word.trim_matches(|c: char| !c.is_alphanumeric());
    PRESERVED_SET.contains(core)
}

/// Common English words that carry no topical signal.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "him", "his", "how", "its", "may", "new", "now", "old",
    "see", "two", "way", "who", "did", "get", "let", "say", "she", "too", "use", "with", "this",
    "that", "from", "they", "will", "would", "there", "their", "what", "about", "which", "when",
    "make", "like", "time", "just", "know", "take", "into", "year", "your", "some", "could",
    "them", "than", "then", "look", "only", "come", "over", "also", "back", "after", "first",
    "well", "even", "want", "because", "these", "give", "most", "very", "been", "were", "more",
    "other", "such", "here", "where", "each", "those", "while", "should", "does", "being",
    "both", "between", "through", "under", "before", "many", "much", "same", "own", "why",
    "yet", "via", "per", "using", "used", "non",
];

/// Navigation and interface words captured from page chrome.
pub const UI_CHROME_WORDS: &[&str] = &[
    "click", "menu", "login", "logout", "signin", "signup", "sign", "register", "subscribe",
    "cookie", "cookies", "accept", "decline", "close", "toggle", "skip", "navigation", "search",
    "share", "follow", "home", "next", "previous", "prev", "loading", "button", "footer",
    "header", "sidebar", "copyright", "rights", "reserved", "terms", "policy", "contact",
    "view", "show", "hide", "read", "more", "less", "learn", "page", "pages", "javascript",
    "enable", "browser", "continue", "submit", "email", "password", "account", "dismiss",
];

static STOP_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());
static CHROME_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| UI_CHROME_WORDS.iter().copied().collect());

/// True when a lowercase word should be ignored by frequency analysis.
pub fn is_noise_word(word: &str) -> bool {
    STOP_SET.contains(word) || CHROME_SET.contains(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_collapses_abbreviation_and_expansion() {
        assert_eq!(
            canonicalize("Every NFT is a non-fungible token."),
            "Every Non-Fungible Token (NFT) is a Non-Fungible Token (NFT)."
        );
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize("Spend a UTXO with a PSBT over LN.");
        let twice = canonicalize(&once);
        assert_eq!(once, twice);
        assert!(once.contains("Unspent Transaction Output (UTXO)"));
        assert!(once.contains("Lightning Network (LN)"));

        let lower = canonicalize("the lightning network (LN) is fast");
        assert_eq!(lower, "the Lightning Network (LN) is fast");
        assert_eq!(canonicalize(&lower), lower);
    }

    #[test]
    fn canonicalize_respects_word_boundaries() {
        assert_eq!(canonicalize("power and position"), "power and position");
        assert_eq!(canonicalize("NFTs"), "NFTs");
    }

    #[test]
    fn domain_terms_match_hyphen_or_space() {
        let found = domain_terms_in("An open source hardware wallet for self-custody");
        assert!(found.contains(&"open-source"));
        assert!(found.contains(&"hardware-wallet"));
        assert!(found.contains(&"wallet"));
        assert!(found.contains(&"self-custody"));
        assert!(!found.contains(&"bitcoin"));
    }

    #[test]
    fn ecosystems_are_deduplicated_in_table_order() {
        let labels = ecosystems_in("lnd and LNURL on Bitcoin with taproot");
        assert_eq!(labels, vec!["bitcoin", "lightning"]);
        assert!(ecosystems_in("gardening tips").is_empty());
    }

    #[test]
    fn noise_words() {
        assert!(is_noise_word("the"));
        assert!(is_noise_word("cookie"));
        assert!(!is_noise_word("wallet"));
    }
}
