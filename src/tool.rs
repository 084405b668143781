//! Pure string helpers shared by every chain: permlink generation,
//! transliteration and post URL parsing. Nothing here performs I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Separator placed between words of a generated permlink.
pub const DEFAULT_SPACE_REPLACEMENT: &str = "-";

/// Prefix marking slugs that were transliterated from cyrillic, so they can
/// be rolled back by frontends that understand it.
pub const DEFAULT_RU_PREFIX: &str = "ru--";

const COMMENT_PERMLINK_DATETIME_FORMAT: &str = "%Y%m%dt%H%M%Sz";

// Order matters: multi-letter sequences must be replaced before their parts.
const TRANSLITERATION: &[(&str, &str)] = &[
    ("ые", "yie"),
    ("щ", "shch"),
    ("ш", "sh"),
    ("ч", "ch"),
    ("ц", "cz"),
    ("й", "ij"),
    ("ё", "yo"),
    ("э", "ye"),
    ("ю", "yu"),
    ("я", "ya"),
    ("х", "kh"),
    ("ж", "zh"),
    ("а", "a"),
    ("б", "b"),
    ("в", "v"),
    ("ґ", "g"),
    ("г", "g"),
    ("д", "d"),
    ("е", "e"),
    ("є", "e"),
    ("з", "z"),
    ("и", "i"),
    ("і", "i"),
    ("ї", "i"),
    ("к", "k"),
    ("л", "l"),
    ("м", "m"),
    ("н", "n"),
    ("о", "o"),
    ("п", "p"),
    ("р", "r"),
    ("с", "s"),
    ("т", "t"),
    ("у", "u"),
    ("ф", "f"),
    ("ъ", "xx"),
    ("ы", "y"),
    ("ь", "x"),
];

/// Author and permlink extracted from a post URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLocator {
    pub author: String,
    pub permlink: String,
}

/// Lowercases `input`, transliterates cyrillic to latin and strips every
/// symbol that is not allowed in a permlink.
///
/// Whitespace, commas, dots and slashes become `space_replacement`; runs of
/// the replacement collapse into one and a single leading or trailing
/// replacement is trimmed. When any cyrillic letter was transliterated the
/// result is prefixed with `ru_prefix`.
pub fn strip_and_transliterate(input: &str, space_replacement: &str, ru_prefix: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let spaced: String = input
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, ',' | '.' | '/') {
                space_replacement.to_string()
            } else {
                c.to_string()
            }
        })
        .collect();

    let mut transliterated = spaced.clone();
    for (from, to) in TRANSLITERATION {
        transliterated = transliterated.replace(from, to);
    }
    let contains_ru = transliterated != spaced;

    let allowed: String = transliterated
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || space_replacement.contains(*c))
        .collect();

    let mut result = collapse_repeats(&allowed, space_replacement);
    if !space_replacement.is_empty() {
        if let Some(stripped) = result.strip_prefix(space_replacement) {
            result = stripped.to_string();
        }
        if let Some(stripped) = result.strip_suffix(space_replacement) {
            result = stripped.to_string();
        }
    }

    if contains_ru {
        format!("{ru_prefix}{result}")
    } else {
        result
    }
}

fn collapse_repeats(input: &str, separator: &str) -> String {
    if separator.is_empty() {
        return input.to_string();
    }
    let doubled = separator.repeat(2);
    let mut result = input.to_string();
    while result.contains(&doubled) {
        result = result.replace(&doubled, separator);
    }
    result
}

/// Slug with the default separator and cyrillic prefix.
pub fn slugify(text: &str) -> String {
    strip_and_transliterate(text, DEFAULT_SPACE_REPLACEMENT, DEFAULT_RU_PREFIX)
}

/// Permlink for a reply to `@post_author/post_permlink`, or `None` when
/// either part is empty.
pub fn build_comment_permlink(post_author: &str, post_permlink: &str) -> Option<String> {
    build_comment_permlink_at(post_author, post_permlink, Utc::now())
}

pub fn build_comment_permlink_at(
    post_author: &str,
    post_permlink: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    if post_author.is_empty() || post_permlink.is_empty() {
        return None;
    }

    Some(format!(
        "re-{}-{}-{}",
        post_author,
        post_permlink,
        now.format(COMMENT_PERMLINK_DATETIME_FORMAT)
    ))
}

/// Collision-resistant variant of `permlink`: the original with the current
/// unix timestamp appended.
pub fn build_unique_permlink(permlink: &str) -> String {
    build_unique_permlink_at(permlink, Utc::now())
}

pub fn build_unique_permlink_at(permlink: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", permlink, now.timestamp())
}

/// Parses a post URL of any supported frontend.
///
/// `?author=..&permlink=..` query parameters take precedence over the
/// `/@author/permlink` path form. Returns `None` when neither is present.
pub fn parse_post_url(url: &str) -> Option<PostLocator> {
    if url.is_empty() {
        return None;
    }

    let lowered = url.to_lowercase();
    let base = Url::parse("https://localhost/").ok()?;
    let parsed = base.join(&lowered).ok()?;

    let mut author = None;
    let mut permlink = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "author" => author = Some(value.into_owned()),
            "permlink" => permlink = Some(value.into_owned()),
            _ => {}
        }
    }
    if let (Some(author), Some(permlink)) = (author, permlink) {
        return Some(PostLocator { author, permlink });
    }

    let parts: Vec<&str> = parsed.path_segments()?.collect();
    let author_index = parts
        .iter()
        .position(|part| part.starts_with('@'))?;
    let permlink = parts
        .get(author_index + 1)
        .filter(|permlink| !permlink.is_empty())?;

    Some(PostLocator {
        author: parts[author_index][1..].to_string(),
        permlink: permlink.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_empty_url() {
        assert_eq!(parse_post_url(""), None);
    }

    #[test]
    fn parses_golos_url() {
        let result = parse_post_url("https://golos.io/alba-stories/@alba-stories/otelx-1000-zvyozd");
        assert_eq!(
            result,
            Some(PostLocator {
                author: "alba-stories".into(),
                permlink: "otelx-1000-zvyozd".into(),
            })
        );
    }

    #[test]
    fn parses_url_with_trailing_slash() {
        let result = parse_post_url(
            "https://goldvoice.club/@alex007/bitstash-kriptovalyutnyi-internet-magzin-tovarov/",
        );
        assert_eq!(
            result,
            Some(PostLocator {
                author: "alex007".into(),
                permlink: "bitstash-kriptovalyutnyi-internet-magzin-tovarov".into(),
            })
        );
    }

    #[test]
    fn query_parameters_win_over_path() {
        let result = parse_post_url(
            "https://liveblogs.space/@someone/other?author=tatdt&permlink=----czerkovx-voskreseniya",
        );
        assert_eq!(
            result,
            Some(PostLocator {
                author: "tatdt".into(),
                permlink: "----czerkovx-voskreseniya".into(),
            })
        );
    }

    #[test]
    fn rejects_url_without_author() {
        assert_eq!(parse_post_url("https://steemit.com/trending"), None);
        assert_eq!(parse_post_url("https://steemit.com/@alice"), None);
    }

    #[test]
    fn strips_and_transliterates() {
        let cases = [
            ("", "-", "ru--", ""),
            ("hello", "-", "ru--", "hello"),
            ("Hello dear friends!", "-", "ru--", "hello-dear-friends"),
            ("Word-to-Word text", "-", "ru--", "word-to-word-text"),
            ("Several  spaces   test     fin", "-", "ru--", "several-spaces-test-fin"),
            ("Several  spaces   test     fin", "_", "ru--", "several_spaces_test_fin"),
            ("Another,item.Be-be", "-", "ru--", "another-item-be-be"),
            ("Привіт друзі!", "-", "ru--", "ru--privit-druzi"),
            ("Странные вещи", "-", "ru--", "ru--strannyie-veshchi"),
            ("(💯 апвот) Очень злая собака 😨 - 7", "-", "ru--", "ru--apvot-ochenx-zlaya-sobaka-7"),
            (
                "[Щоденник досягнень] День 32/100 | 08.09.2018",
                "_",
                "ua-",
                "ua-shchodennik_dosyagnenx_denx_32_100_08_09_2018",
            ),
            ("[Горнятко кави] Я Морячка Ты Моряк ⛵😱", "-", "ru--", "ru--gornyatko-kavi-ya-moryachka-ty-moryak"),
        ];

        for (input, replacement, prefix, expected) in cases {
            assert_eq!(
                strip_and_transliterate(input, replacement, prefix),
                expected,
                "input: {input}"
            );
        }
    }

    #[test]
    fn builds_comment_permlink() {
        let now = Utc.with_ymd_and_hms(2018, 10, 10, 15, 15, 15).unwrap();
        assert_eq!(build_comment_permlink_at("", "", now), None);
        assert_eq!(build_comment_permlink_at("zavz9t", "", now), None);
        assert_eq!(build_comment_permlink_at("", "some-link", now), None);
        assert_eq!(
            build_comment_permlink_at("hello", "to-the-words", now).as_deref(),
            Some("re-hello-to-the-words-20181010t151515z")
        );
    }

    #[test]
    fn unique_permlink_appends_unix_timestamp() {
        let now = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        assert_eq!(build_unique_permlink_at("hello-world", now), "hello-world-1700000000");
    }
}
