use std::fmt;

#[derive(Debug, Clone)]
pub enum IpTaggerError {
    Transport(String),
    Parse(String),
    Resolution(String),
    Validation(String),
}

impl IpTaggerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            IpTaggerError::Transport(_) => "E001",
            IpTaggerError::Parse(_) => "E002",
            IpTaggerError::Resolution(_) => "E003",
            IpTaggerError::Validation(_) => "E004",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            IpTaggerError::Transport(_) => "Upstream Transport Error",
            IpTaggerError::Parse(_) => "Response Parse Error",
            IpTaggerError::Resolution(_) => "DNS Resolution Error",
            IpTaggerError::Validation(_) => "Validation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            IpTaggerError::Transport(msg) => msg,
            IpTaggerError::Parse(msg) => msg,
            IpTaggerError::Resolution(msg) => msg,
            IpTaggerError::Validation(msg) => msg,
        }
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for IpTaggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for IpTaggerError {}

// 便捷的构造函数
impl IpTaggerError {
    pub fn transport<T: Into<String>>(msg: T) -> Self {
        IpTaggerError::Transport(msg.into())
    }

    pub fn parse<T: Into<String>>(msg: T) -> Self {
        IpTaggerError::Parse(msg.into())
    }

    pub fn resolution<T: Into<String>>(msg: T) -> Self {
        IpTaggerError::Resolution(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        IpTaggerError::Validation(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<ureq::Error> for IpTaggerError {
    fn from(err: ureq::Error) -> Self {
        IpTaggerError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IpTaggerError>;
