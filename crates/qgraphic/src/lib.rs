#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is range-checked or masked")]
#![expect(clippy::cast_sign_loss, reason = "coordinate casts happen after range checks")]
#![expect(clippy::cast_possible_wrap, reason = "grid dimensions fit comfortably in i64")]

mod builtins;
mod codec;
mod exception;
mod expressions;
mod frame;
mod heap;
mod lex;
mod namespace;
mod parse;
mod publish;
mod run;
mod step;
mod value;

pub use crate::{
    builtins::Builtin,
    codec::{QGC_MAGIC, RAW_FRAME_SIZE, decode_qgc, decode_rgb565, encode_qgc, frame_to_rgb565, load_qgc, save_qgc},
    exception::{ExcKind, Exception},
    expressions::{BinOp, Expr, FunctionDecl, Item, LiteralValue, Param, Program, Stmt, TypeName, UnaryOp},
    frame::{FRAME_HEIGHT, FRAME_WIDTH, Frame, Pixel, PixelOutOfRange},
    lex::{KEYWORDS, Token, TokenKind, TokenValue, lex_file, lex_source},
    parse::parse,
    publish::{
        CollectPublish, DEFAULT_FRAME_FILE, FilePublish, NoPublish, PublishHandler, default_frame_path,
        read_frame_file, send_frame_bytes,
    },
    run::Runner,
    step::{
        NoopStepTracer, RecordingStepTracer, StderrStepTracer, StepControl, StepInfo, StepOutcome, StepTracer,
    },
};
