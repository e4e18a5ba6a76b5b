use std::fmt::{self, Display};

// Helper macro to define aggregate ID newtypes and common trait impls
macro_rules! define_id {
    ($name:ident $(, $extra:ident)*) => {
        #[derive(Debug, Clone, PartialEq $(, $extra)*)]
        pub struct $name(i64);

        impl $name {
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

    };
}

define_id!(UserId, Eq, Hash);
define_id!(SongId, Eq, Hash);

/// 上传文件的分类，同时也是存储子目录名和公开 URL 中的路径段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Songs,
    Covers,
}

impl FileCategory {
    pub const ALL: [FileCategory; 2] = [FileCategory::Songs, FileCategory::Covers];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Songs => "songs",
            FileCategory::Covers => "covers",
        }
    }

    /// 根据客户端声明的 Content-Type 前缀推断分类：audio/* -> songs, image/* -> covers
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.trim().to_ascii_lowercase();
        if content_type.starts_with("audio/") {
            Some(FileCategory::Songs)
        } else if content_type.starts_with("image/") {
            Some(FileCategory::Covers)
        } else {
            None
        }
    }

    /// Exact match on the URL/path segment, no case folding.
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == segment)
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FileCategory {
    type Error = String;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_segment(value).ok_or_else(|| format!("invalid value:{}", value))
    }
}
