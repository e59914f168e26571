use std::path::PathBuf;

/// Source of the video path chosen by the user
pub trait FilePicker: Send + Sync {
    /// `None` when nothing was chosen
    fn pick_video(&self) -> Option<PathBuf>;
}

/// Native "open file" dialog limited to common video containers
pub struct NativeFilePicker;

impl FilePicker for NativeFilePicker {
    fn pick_video(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title("Open video")
            .add_filter("Video Files", &["mp4", "webm", "avi"])
            .add_filter("All files", &["*"])
            .pick_file()
    }
}
