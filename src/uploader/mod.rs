// 上传模块
//
// - 准入校验：类型白名单、大小上限
// - 有界队列：同时上传的文件数有上限，其余 FIFO 等待
// - 分片传输：按顺序逐片上传，失败按指数退避重试，完成后合并
// - 批次进度汇总

pub mod chunk;
pub mod folder;
pub mod manager;
pub mod progress;
pub mod queue;
pub mod task;
pub mod transmitter;
pub mod validator;

pub use chunk::{chunk_count, chunk_progress, split_chunks, ChunkDescriptor, UploadSource, DEFAULT_CHUNK_SIZE};
pub use folder::{FolderScanner, ScanOptions, ScannedFile};
pub use manager::{BatchReceipt, UploadManager};
pub use progress::{BatchProgress, ProgressTracker};
pub use queue::UploadQueue;
pub use task::{UploadTask, UploadTaskStatus};
pub use transmitter::ChunkTransmitter;
pub use validator::{AdmissionPolicy, CandidateFile};
