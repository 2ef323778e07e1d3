#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: Option<String>,
    /// Raw markdown as submitted
    pub content: String,
    /// `%d.%m.%Y %H:%M`, local time at creation
    pub timestamp: String,
    /// Generated media store names, in upload order
    pub media: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub media: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
