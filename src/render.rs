use pulldown_cmark::{Options, Parser};

use crate::config::{ConfigKey, SiteConfig};
use crate::connection::{Meta, extract};
use crate::content::{Award, Content, base_name, content_kind};
use crate::graph::{ChainLinks, ConnectionLine, count_label};
use crate::listing::choose_columns;
use crate::panel::{Breadcrumb, PANEL_CLICK, Panel};

/// Everything needed to render one output page.
#[derive(Debug)]
pub struct PageData<'a> {
    pub current_path: &'a str,
    pub breadcrumbs: &'a [Breadcrumb],
    /// Panel fragments, already patched for this page.
    pub panels: &'a [String],
    pub content: Option<&'a Content>,
    pub connections: &'a [ConnectionLine],
    pub chain: ChainLinks,
    pub timestamp: i64,
}

pub trait Renderer: Send + Sync {
    fn render_panel(&self, panel: &Panel, index: usize) -> anyhow::Result<String>;
    fn render_page(&self, page: &PageData<'_>) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    config: SiteConfig,
}

impl HtmlRenderer {
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    /// Prefix for media URLs: the media host when set, else site-relative.
    fn media_base(&self) -> &str {
        self.config.get(ConfigKey::MediaHost).trim_end_matches('/')
    }

    fn render_menu(&self, out: &mut String) {
        if self.config.menu.is_empty() {
            return;
        }
        out.push_str("<nav class=\"menu\"><ul>");
        for item in &self.config.menu {
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>",
                escape_html(&item.url),
                escape_html(&item.title)
            ));
        }
        out.push_str("</ul></nav>\n");
    }

    fn render_search(&self, out: &mut String) {
        let host = self.config.get(ConfigKey::SearchHost);
        if host.is_empty() {
            return;
        }
        out.push_str(&format!(
            "<form class=\"search\" data-host=\"{}\" data-index=\"{}\" data-key=\"{}\" data-no-results=\"{}\">",
            escape_html(host),
            escape_html(self.config.get(ConfigKey::SearchIndex)),
            escape_html(self.config.get(ConfigKey::SearchApiKey)),
            escape_html(self.config.get(ConfigKey::NoResultsLabel))
        ));
        out.push_str(&format!(
            "<input type=\"search\" name=\"q\" placeholder=\"{}\"></form>\n",
            escape_html(self.config.get(ConfigKey::SearchLabel))
        ));
    }
}

impl Renderer for HtmlRenderer {
    fn render_panel(&self, panel: &Panel, index: usize) -> anyhow::Result<String> {
        let columns = choose_columns(&panel.files);
        let mut out = String::new();
        out.push_str(&format!(
            "<div class=\"panel\" data-index=\"{index}\" data-dir=\"{}\" {PANEL_CLICK}>\n<ul>\n",
            escape_html(&panel.dir)
        ));
        for file in &panel.files {
            let path = escape_html(&crate::media::join_dir(&panel.dir, &file.name));
            let (class, href) = if file.is_folder {
                ("folder", format!("/{path}/"))
            } else {
                ("file", format!("/{path}"))
            };
            let class = if file.is_missing {
                format!("{class} missing")
            } else {
                class.to_string()
            };
            out.push_str(&format!("<li><a class=\"{class}\" href=\"{href}\">"));
            if let Some(image) = &file.image {
                let style = image.thumb_style(self.media_base());
                if !style.is_empty() {
                    out.push_str(&format!(
                        "<span class=\"thumb\" style=\"{}\"></span>",
                        escape_html(&style)
                    ));
                }
            }
            out.push_str(&escape_html(&file.title));
            out.push_str("</a>");
            for name in &columns {
                let value = file
                    .columns
                    .iter()
                    .find(|column| column.name == *name)
                    .map(|column| column.value.as_str())
                    .unwrap_or("");
                out.push_str(&format!(
                    "<span class=\"column\" data-column=\"{name}\">{}</span>",
                    escape_html(value)
                ));
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n</div>\n");
        Ok(out)
    }

    fn render_page(&self, page: &PageData<'_>) -> anyhow::Result<String> {
        let site_title = self.config.get(ConfigKey::Title);
        let page_title = match page.content {
            Some(content) => content.display_name(),
            None if page.current_path.is_empty() => self.config.get(ConfigKey::HomeLabel).to_string(),
            None => base_name(page.current_path).to_string(),
        };

        let mut out = String::new();
        out.push_str("<!doctype html>\n");
        out.push_str(&format!(
            "<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\">\n<title>{} - {}</title>\n",
            escape_html(self.config.get(ConfigKey::Lang)),
            escape_html(&page_title),
            escape_html(site_title)
        ));
        let description = self.config.get(ConfigKey::Description);
        if !description.is_empty() {
            out.push_str(&format!(
                "<meta name=\"description\" content=\"{}\">\n",
                escape_html(description)
            ));
        }
        let url = self.config.get(ConfigKey::Url).trim_end_matches('/');
        if !url.is_empty() {
            out.push_str(&format!(
                "<link rel=\"canonical\" href=\"{}/{}\">\n",
                escape_html(url),
                escape_html(page.current_path)
            ));
        }
        out.push_str("</head>\n<body>\n");
        self.render_menu(&mut out);
        self.render_search(&mut out);

        out.push_str("<nav class=\"breadcrumbs\">");
        for (idx, crumb) in page.breadcrumbs.iter().enumerate() {
            if idx > 0 {
                out.push_str(" / ");
            }
            let name = if crumb.path.is_empty() {
                self.config.get(ConfigKey::HomeLabel)
            } else {
                crumb.name.as_str()
            };
            out.push_str(&link(&crumb.path, name));
        }
        out.push_str("</nav>\n");

        out.push_str("<div class=\"panels\">\n");
        for panel in page.panels {
            out.push_str(panel);
        }
        out.push_str("</div>\n");

        if let Some(content) = page.content {
            render_content(&mut out, content, self.media_base());
        }
        render_connections(&mut out, page.connections);
        render_chain(&mut out, &page.chain);

        out.push_str(&format!(
            "<footer data-generated=\"{}\">{}",
            page.timestamp,
            escape_html(site_title)
        ));
        let repo = self.config.get(ConfigKey::Repo);
        if !repo.is_empty() {
            out.push_str(&format!(" <a class=\"repo\" href=\"{}\">source</a>", escape_html(repo)));
        }
        out.push_str("</footer>\n</body>\n</html>\n");
        Ok(out)
    }
}

fn render_content(out: &mut String, content: &Content, media_base: &str) {
    out.push_str(&format!(
        "<article class=\"content {}\">\n<h1>{}</h1>\n",
        escape_html(&content_kind(&content.content_id())),
        escape_html(&content.display_name())
    ));
    if !content.subtitle.is_empty() {
        out.push_str(&format!("<p class=\"subtitle\">{}</p>\n", escape_html(&content.subtitle)));
    }
    if let Some(image) = &content.image {
        out.push_str(&format!(
            "<img class=\"cover\" src=\"{}/{}\" width=\"{}\" height=\"{}\" alt=\"\">\n",
            escape_html(media_base),
            escape_html(&crate::media::join_dir(
                crate::content::dir_name(&content.content_id()),
                &image.path
            )),
            image.width,
            image.height
        ));
    }
    if !content.description.is_empty() {
        out.push_str(&format!(
            "<p class=\"description\">{}</p>\n",
            escape_html(&content.description)
        ));
    }

    let columns = content.columns();
    let credits = credits(content);
    if !columns.is_empty() || !credits.is_empty() {
        out.push_str("<dl class=\"fields\">\n");
        for column in &columns {
            out.push_str(&format!(
                "<dt>{}</dt><dd>{}</dd>\n",
                column.name,
                escape_html(&column.value)
            ));
        }
        for (label, targets) in &credits {
            let links: Vec<String> = targets
                .iter()
                .map(|target| link(target, base_name(target)))
                .collect();
            out.push_str(&format!(
                "<dt>{}</dt><dd>{}</dd>\n",
                escape_html(count_label(label, targets.len())),
                links.join(", ")
            ));
        }
        out.push_str("</dl>\n");
    }

    if !content.links.is_empty() {
        out.push_str("<ul class=\"links\">\n");
        for item in &content.links {
            let title = if item.title.is_empty() { &item.url } else { &item.title };
            out.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                escape_html(&item.url),
                escape_html(title)
            ));
        }
        out.push_str("</ul>\n");
    }

    for category in &content.categories {
        let winner = match &category.winner.reference {
            Some(reference) => link(&reference.path, &category.winner.fallback),
            None => escape_html(&category.winner.fallback),
        };
        out.push_str(&format!(
            "<p class=\"category\"><b>{}</b>: {winner}</p>\n",
            escape_html(&category.name)
        ));
    }

    let buckets: [(&str, &[Award]); 7] = [
        ("Awards", &content.awards),
        ("Cinematography awards", &content.cinematography_awards),
        ("Music awards", &content.music_awards),
        ("Editing awards", &content.editors_awards),
        ("Writing awards", &content.writers_awards),
        ("Directing awards", &content.directors_awards),
        ("Screenplay awards", &content.screenplay_awards),
    ];
    for (title, awards) in buckets {
        render_awards(out, title, awards);
    }
    for character in &content.characters {
        if character.awards.is_empty() {
            continue;
        }
        let title = format!("{} as {}", character.actor, character.name);
        render_awards(out, &title, &character.awards);
    }

    if !content.html.is_empty() {
        out.push_str("<div class=\"text\">\n");
        out.push_str(&content.html);
        out.push_str("</div>\n");
    }
    out.push_str("</article>\n");
}

/// Outgoing role connections grouped by label, in declaration order.
fn credits(content: &Content) -> Vec<(String, Vec<String>)> {
    let mut credits: Vec<(String, Vec<String>)> = Vec::new();
    for connection in extract(content) {
        if connection.meta == Meta::Previous || connection.parent.is_some() {
            continue;
        }
        match credits.iter_mut().find(|(label, _)| *label == connection.label) {
            Some((_, targets)) => {
                if !targets.contains(&connection.to) {
                    targets.push(connection.to);
                }
            }
            None => credits.push((connection.label, vec![connection.to])),
        }
    }
    credits
}

fn render_awards(out: &mut String, title: &str, awards: &[Award]) {
    if awards.is_empty() {
        return;
    }
    out.push_str(&format!(
        "<section class=\"awards\">\n<h2>{}</h2>\n<ul>\n",
        escape_html(title)
    ));
    for award in awards {
        out.push_str(&format!(
            "<li>{}: {}</li>\n",
            link(&award.reference, base_name(&award.reference)),
            escape_html(&award.category)
        ));
    }
    out.push_str("</ul>\n</section>\n");
}

fn render_connections(out: &mut String, lines: &[ConnectionLine]) {
    if lines.is_empty() {
        return;
    }
    out.push_str("<section class=\"connections\">\n<ul>\n");
    for line in lines {
        out.push_str("<li>");
        out.push_str(&link(&line.from, base_name(&line.from)));
        let groups: Vec<String> = line
            .groups
            .iter()
            .filter(|group| !group.label.is_empty())
            .map(|group| {
                if group.info.is_empty() {
                    escape_html(&group.label)
                } else {
                    format!(
                        "{} ({})",
                        escape_html(&group.label),
                        escape_html(&group.info.join(", "))
                    )
                }
            })
            .collect();
        if !groups.is_empty() {
            out.push_str(&format!(" <span class=\"roles\">{}</span>", groups.join(", ")));
        }
        if !line.parents.is_empty() {
            out.push_str(&format!(
                " <span class=\"episodes\">{}</span>",
                escape_html(&line.parents.join(", "))
            ));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n</section>\n");
}

fn render_chain(out: &mut String, chain: &ChainLinks) {
    if chain.prev.is_none() && chain.next.is_none() {
        return;
    }
    out.push_str("<nav class=\"chain\">");
    if let Some(prev) = &chain.prev {
        out.push_str(&format!("<span class=\"prev\">{}</span>", link(prev, base_name(prev))));
    }
    if let Some(next) = &chain.next {
        out.push_str(&format!("<span class=\"next\">{}</span>", link(next, base_name(next))));
    }
    out.push_str("</nav>\n");
}

fn link(path: &str, text: &str) -> String {
    format!(
        "<a href=\"/{}\">{}</a>",
        escape_html(path),
        escape_html(text)
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn markdown_to_html(md: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(md, options);
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}
