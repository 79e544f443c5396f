//! RSS 2.0 / Atom feed entries

use super::{SourceError, SourceResult};
use crate::html::html_to_text;
use chrono::{DateTime, Utc};

/// The fields the crawlers read from a feed entry
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    /// Summary (or content when no summary exists) as plain text
    pub text: String,
    /// Non-empty author names in document order
    pub authors: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

/// Parse an RSS or Atom document
pub fn parse_feed(body: &[u8], url: &str) -> SourceResult<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(body).map_err(|e| SourceError::Feed {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| {
            let raw_text = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            FeedEntry {
                id: entry.id,
                title: entry
                    .title
                    .map(|t| html_to_text(&t.content))
                    .unwrap_or_default(),
                link: entry.links.into_iter().next().map(|l| l.href),
                text: html_to_text(&raw_text),
                authors: entry
                    .authors
                    .into_iter()
                    .map(|p| p.name.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect(),
                published: entry.published.or(entry.updated),
                categories: entry.categories.into_iter().map(|c| c.term).collect(),
            }
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>r/LocalLLaMA</title>
  <id>https://www.reddit.com/r/LocalLLaMA/.rss</id>
  <updated>2026-10-16T08:00:00+00:00</updated>
  <entry>
    <author><name>/u/llama_fan</name></author>
    <category term="LocalLLaMA" label="r/LocalLLaMA"/>
    <content type="html">&lt;div&gt;&lt;p&gt;New &lt;b&gt;quantization&lt;/b&gt; results&lt;/p&gt;&lt;/div&gt;</content>
    <id>t3_abc123</id>
    <link href="https://www.reddit.com/r/LocalLLaMA/comments/abc123/new_quant/"/>
    <updated>2026-10-16T07:30:00+00:00</updated>
    <published>2026-10-16T07:00:00+00:00</published>
    <title>New quantization results</title>
  </entry>
  <entry>
    <author><name>/u/other</name></author>
    <content type="html">&lt;p&gt;Second post&lt;/p&gt;</content>
    <id>t3_def456</id>
    <link href="https://www.reddit.com/r/LocalLLaMA/comments/def456/second/"/>
    <updated>2026-10-16T06:00:00+00:00</updated>
    <title>Second post</title>
  </entry>
</feed>"#;

    pub const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Vendor Blog</title>
    <link>https://blog.example.com</link>
    <description>News</description>
    <item>
      <title>Introducing Model X</title>
      <link>https://blog.example.com/model-x</link>
      <description>&lt;p&gt;Model X is &lt;em&gt;faster&lt;/em&gt;.&lt;/p&gt;</description>
      <pubDate>Thu, 15 Oct 2026 10:00:00 GMT</pubDate>
      <guid>https://blog.example.com/model-x</guid>
    </item>
    <item>
      <title>Safety update</title>
      <link>https://blog.example.com/safety</link>
      <description>Plain description</description>
    </item>
  </channel>
</rss>"#;
}
