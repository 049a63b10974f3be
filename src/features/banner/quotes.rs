use rand::seq::SliceRandom;

/// 内置引用语录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub text: &'static str,
    pub author: &'static str,
}

const QUOTES: &[Quote] = &[
    Quote {
        text: "The best way to predict the future is to create it.",
        author: "Peter Drucker",
    },
    Quote {
        text: "Simplicity is the ultimate sophistication.",
        author: "Leonardo da Vinci",
    },
    Quote {
        text: "Stay hungry, stay foolish.",
        author: "Stewart Brand",
    },
    Quote {
        text: "Well done is better than well said.",
        author: "Benjamin Franklin",
    },
    Quote {
        text: "What we think, we become.",
        author: "Buddha",
    },
    Quote {
        text: "It always seems impossible until it is done.",
        author: "Nelson Mandela",
    },
    Quote {
        text: "Action is the foundational key to all success.",
        author: "Pablo Picasso",
    },
    Quote {
        text: "Quality is not an act, it is a habit.",
        author: "Will Durant",
    },
    Quote {
        text: "Make each day your masterpiece.",
        author: "John Wooden",
    },
    Quote {
        text: "Dream big and dare to fail.",
        author: "Norman Vaughan",
    },
];

pub fn all() -> &'static [Quote] {
    QUOTES
}

/// 随机取一条（结果不可缓存）
pub fn random_quote() -> Quote {
    QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(QUOTES[0])
}

/// 网址行显示的署名
pub fn attribution(quote: &Quote) -> String {
    format!("— {}", quote.author)
}
