use serde::Serialize;

#[derive(Serialize)]
pub struct FolderStatusQuery<'a> {
    pub folder: &'a str,
}

#[derive(Serialize)]
pub struct EventStreamQuery {
    pub since: u64,
    pub timeout: u64,
}

#[derive(Serialize)]
pub struct CompletionQuery<'a> {
    pub device: &'a str,
    pub folder: &'a str,
}
