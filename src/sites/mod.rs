use once_cell::sync::Lazy;
use url::Url;

/// 站点配置：图片选择器 + 章节地址模板。
/// 模板里 {base} 会被替换成作品主页地址，{chapter} 替换成章节号。
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub domain: &'static str,
    pub image_selector: &'static str,
    pub chapter_url_template: &'static str,
}

// 内置站点表。扩展新站点只需要在这里加一条。
static SITE_PROFILES: Lazy<Vec<SiteProfile>> = Lazy::new(|| {
    vec![
        SiteProfile {
            domain: "allmanga.to",
            image_selector: "#pictureViewer img.img.noselect",
            chapter_url_template: "{base}/chapter-{chapter}-sub",
        },
        SiteProfile {
            domain: "mangaread.org",
            image_selector: "img.wp-manga-chapter-img",
            chapter_url_template: "{base}/chapter-{chapter}/",
        },
        SiteProfile {
            domain: "nitroscans.net",
            image_selector: "img.wp-manga-chapter-img",
            chapter_url_template: "{base}/chapter-{chapter}/",
        },
        SiteProfile {
            domain: "mgeko.cc",
            image_selector: "#chapter-reader img",
            chapter_url_template: "{base}-chapter-{chapter}-eng-li/",
        },
    ]
});

#[derive(Debug)]
pub enum SiteError {
    InvalidUrl(String),
    UnknownSite(String),
}

impl std::fmt::Display for SiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteError::InvalidUrl(msg) => write!(f, "无效的 URL: {}", msg),
            SiteError::UnknownSite(host) => write!(f, "未找到匹配的站点配置: {}", host),
        }
    }
}

impl std::error::Error for SiteError {}

/// 按 URL 的域名精确匹配站点配置。每次运行只解析一次。
/// 域名开头的 www. 会被剥掉再比对，站点表统一登记裸域名。
pub fn resolve_profile(url: &str) -> Result<&'static SiteProfile, SiteError> {
    let parsed = url
        .parse::<Url>()
        .map_err(|e| SiteError::InvalidUrl(e.to_string()))?;
    let host = parsed.host_str().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);
    SITE_PROFILES
        .iter()
        .find(|p| p.domain == host)
        .ok_or_else(|| SiteError::UnknownSite(host.to_string()))
}

/// 渲染某一章的抓取地址。纯函数，章节号范围由上层校验。
pub fn chapter_url(template: &str, base_url: &str, chapter: u32) -> String {
    template
        .replace("{base}", base_url)
        .replace("{chapter}", &chapter.to_string())
}
