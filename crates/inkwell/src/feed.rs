//! RSS 2.0 rendering of the newest posts.

use inkwell_common::Post;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to write feed: {0}")]
pub struct FeedError(String);

/// Channel-level fields of the feed
#[derive(Debug, Clone)]
pub struct FeedChannel {
    pub title: String,
    pub description: String,
    /// Site root, e.g. `http://blog.example.com`
    pub link: String,
    pub author_name: String,
    pub author_email: String,
}

/// Render `posts` as an RSS document. Item links are `<link>/<url>`.
pub fn render_rss(channel: &FeedChannel, posts: &[Post]) -> Result<String, FeedError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new("rss").with_attributes([("version", "2.0")])),
    )?;
    emit(&mut writer, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &channel.title)?;
    text_element(&mut writer, "link", &channel.link)?;
    text_element(&mut writer, "description", &channel.description)?;
    let author = author_field(channel);
    if let Some(author) = &author {
        text_element(&mut writer, "managingEditor", author)?;
    }

    for post in posts {
        let link = format!("{}/{}", channel.link, post.url);
        emit(&mut writer, Event::Start(BytesStart::new("item")))?;
        text_element(&mut writer, "title", &post.title)?;
        text_element(&mut writer, "link", &link)?;
        text_element(&mut writer, "guid", &link)?;
        text_element(&mut writer, "description", &post.body)?;
        if let Some(author) = &author {
            text_element(&mut writer, "author", author)?;
        }
        if let Some(date) = chrono::DateTime::from_timestamp(post.date, 0) {
            text_element(&mut writer, "pubDate", &date.to_rfc2822())?;
        }
        for tag in &post.tags {
            text_element(&mut writer, "category", tag)?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("channel")))?;
    emit(&mut writer, Event::End(BytesEnd::new("rss")))?;
    String::from_utf8(writer.into_inner()).map_err(|e| FeedError(e.to_string()))
}

/// RSS wants `email (name)`; without an email there is nothing to put there
fn author_field(channel: &FeedChannel) -> Option<String> {
    match (channel.author_email.is_empty(), channel.author_name.is_empty()) {
        (true, _) => None,
        (false, true) => Some(channel.author_email.clone()),
        (false, false) => Some(format!("{} ({})", channel.author_email, channel.author_name)),
    }
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), FeedError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), FeedError> {
    writer.write_event(event).map_err(|e| FeedError(e.to_string()))
}
