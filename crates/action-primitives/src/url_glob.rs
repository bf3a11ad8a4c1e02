//! URL glob matching used by `wait_for_url`-style conditions.
//!
//! `**` matches any run of characters, `*` any run without `/`, `?` a single
//! character other than `/`. Everything else is literal and the pattern must
//! cover the whole URL.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    AnyDeep,
    AnySegment,
    OneChar,
    Literal(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlGlob {
    source: String,
    tokens: Vec<Token>,
}

impl UrlGlob {
    pub fn new(pattern: &str) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars().peekable();
        while let Some(ch) = chars.next() {
            let token = match ch {
                '*' if chars.peek() == Some(&'*') => {
                    chars.next();
                    // `***` and longer collapse into one deep wildcard
                    while chars.peek() == Some(&'*') {
                        chars.next();
                    }
                    Token::AnyDeep
                }
                '*' => Token::AnySegment,
                '?' => Token::OneChar,
                other => Token::Literal(other),
            };
            tokens.push(token);
        }
        Self {
            source: pattern.to_string(),
            tokens,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, url: &str) -> bool {
        let text: Vec<char> = url.chars().collect();
        let m = text.len();

        // reachable[j]: the first i tokens can consume exactly text[..j]
        let mut reachable = vec![false; m + 1];
        reachable[0] = true;
        for token in &self.tokens {
            let mut next = vec![false; m + 1];
            match token {
                Token::AnyDeep => {
                    let mut seen = false;
                    for j in 0..=m {
                        seen |= reachable[j];
                        next[j] = seen;
                    }
                }
                Token::AnySegment => {
                    let mut carry = false;
                    for j in 0..=m {
                        if j > 0 && text[j - 1] == '/' {
                            carry = false;
                        }
                        carry |= reachable[j];
                        next[j] = carry;
                    }
                }
                Token::OneChar => {
                    for j in 1..=m {
                        next[j] = reachable[j - 1] && text[j - 1] != '/';
                    }
                }
                Token::Literal(ch) => {
                    for j in 1..=m {
                        next[j] = reachable[j - 1] && text[j - 1] == *ch;
                    }
                }
            }
            reachable = next;
        }
        reachable[m]
    }
}

impl std::fmt::Display for UrlGlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

pub fn glob_matches(pattern: &str, url: &str) -> bool {
    UrlGlob::new(pattern).matches(url)
}
