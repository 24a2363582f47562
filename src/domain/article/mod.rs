pub mod model;
pub mod repository;
pub mod service;

// 公開APIの再エクスポート

// model.rsから
pub use model::{
    Article, BiasLabel, IngestFailure, IngestReport, NewArticle, ParseBiasLabelError,
    SourceArticle,
};

// repository.rsから
pub use repository::{get_article, insert_articles, search_articles, ArticleQuery};

// service.rsから
pub use service::{ingest_articles, prepare_articles, DEFAULT_CATEGORY};
