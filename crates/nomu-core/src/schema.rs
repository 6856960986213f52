/// Arrow schema definitions for the statute corpus.
pub mod corpus {
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    pub const TEXT: &str = "text";
    pub const SOURCE: &str = "source";
    pub const ARTICLE_ID: &str = "article_id";
    pub const CHAPTER: &str = "chapter";
    pub const SECTION: &str = "section";
    pub const EMBEDDING: &str = "embedding";
    /// Added by LanceDB to vector search results.
    pub const DISTANCE: &str = "_distance";

    /// Schema for the `statute_articles` table: one row per article chunk.
    pub fn statute_articles_schema(embedding_dim: i32) -> Schema {
        Schema::new(vec![
            Field::new(TEXT, DataType::Utf8, false),
            Field::new(SOURCE, DataType::Utf8, false),
            Field::new(ARTICLE_ID, DataType::Utf8, true),
            Field::new(CHAPTER, DataType::Utf8, true),
            Field::new(SECTION, DataType::Utf8, true),
            Field::new(
                EMBEDDING,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim,
                ),
                true,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::corpus;
    use arrow::datatypes::DataType;

    #[test]
    fn statute_articles_schema_has_expected_fields() {
        let schema = corpus::statute_articles_schema(3072);
        assert_eq!(schema.fields().len(), 6);
        assert!(schema.field_with_name(corpus::ARTICLE_ID).is_ok());
        let emb = schema.field_with_name(corpus::EMBEDDING).unwrap();
        assert!(matches!(emb.data_type(), DataType::FixedSizeList(_, 3072)));
    }
}
