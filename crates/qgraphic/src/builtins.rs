//! The built-in functions seeded into the global environment.
//!
//! Every built-in receives its already-evaluated argument list and the
//! source line of the call; arity and type mismatches are runtime errors
//! reported on that line. A *point* argument is either a `frame -> (x y)`
//! pixel reference (which degrades to its coordinates) or a bare 2-tuple
//! of integers.

use std::path::Path;

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    codec,
    exception::{RunError, RunResult},
    frame::Frame,
    heap::{FrameId, Heap},
    value::{PixelRef, Value},
};

/// The built-in function set, named exactly as in source programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString, IntoStaticStr)]
pub enum Builtin {
    /// `Frame()` — a new change-tracked frame.
    Frame,
    #[strum(serialize = "setRed")]
    SetRed,
    #[strum(serialize = "setGreen")]
    SetGreen,
    #[strum(serialize = "setBlue")]
    SetBlue,
    #[strum(serialize = "setColor")]
    SetColor,
    #[strum(serialize = "getPixel")]
    GetPixel,
    #[strum(serialize = "getRed")]
    GetRed,
    #[strum(serialize = "getGreen")]
    GetGreen,
    #[strum(serialize = "getBlue")]
    GetBlue,
    #[strum(serialize = "makeRect")]
    MakeRect,
    #[strum(serialize = "makeLine")]
    MakeLine,
    #[strum(serialize = "makeCurve")]
    MakeCurve,
    #[strum(serialize = "makeOval")]
    MakeOval,
    Fill,
    #[strum(serialize = "LoadQGC")]
    LoadQgc,
    #[strum(serialize = "SaveQGC")]
    SaveQgc,
}

impl Builtin {
    /// The surface name of this built-in.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Invokes the built-in with evaluated arguments.
    pub(crate) fn call(self, args: &[Value], heap: &mut Heap, line: u32) -> RunResult<Value> {
        match self {
            Self::Frame => {
                if !args.is_empty() {
                    return Err(RunError::runtime("Frame() takes no arguments", line));
                }
                Ok(Value::Frame(heap.alloc_frame(Frame::new())))
            }
            Self::SetRed | Self::SetGreen | Self::SetBlue => {
                self.check_arity(args, 2, line)?;
                let ptr = self.pixel_ref_arg(&args[0], line)?;
                let value = self.int_arg(&args[1], 2, line)?;
                self.mutate_frame(heap, ptr.frame, line, |frame| match self {
                    Self::SetRed => frame.set_red(ptr.x, ptr.y, value),
                    Self::SetGreen => frame.set_green(ptr.x, ptr.y, value),
                    _ => frame.set_blue(ptr.x, ptr.y, value),
                })
            }
            Self::SetColor => {
                self.check_arity(args, 2, line)?;
                let ptr = self.pixel_ref_arg(&args[0], line)?;
                let (r, g, b) = self.color_arg(&args[1], 2, line)?;
                self.mutate_frame(heap, ptr.frame, line, |frame| frame.set_color(ptr.x, ptr.y, r, g, b))
            }
            Self::GetPixel | Self::GetRed | Self::GetGreen | Self::GetBlue => {
                self.check_arity(args, 1, line)?;
                let ptr = self.pixel_ref_arg(&args[0], line)?;
                let (r, g, b) = heap
                    .frame(ptr.frame)
                    .get_pixel(ptr.x, ptr.y)
                    .map_err(|err| RunError::runtime(err.to_string(), line))?;
                Ok(match self {
                    Self::GetPixel => Value::tuple3(Value::Int(r), Value::Int(g), Value::Int(b)),
                    Self::GetRed => Value::Int(r),
                    Self::GetGreen => Value::Int(g),
                    _ => Value::Int(b),
                })
            }
            Self::MakeRect | Self::MakeLine | Self::MakeOval => {
                self.check_arity(args, 4, line)?;
                let frame_id = self.frame_arg(&args[0], line)?;
                let (x1, y1) = self.point_arg(&args[1], 2, line)?;
                let (x2, y2) = self.point_arg(&args[2], 3, line)?;
                let (r, g, b) = self.color_arg(&args[3], 4, line)?;
                self.mutate_frame(heap, frame_id, line, |frame| match self {
                    Self::MakeRect => frame.make_rect(x1, y1, x2, y2, r, g, b),
                    Self::MakeLine => {
                        frame.make_line(x1, y1, x2, y2, r, g, b);
                        Ok(())
                    }
                    _ => {
                        frame.make_oval(x1, y1, x2, y2, r, g, b);
                        Ok(())
                    }
                })
            }
            Self::MakeCurve => {
                self.check_arity(args, 5, line)?;
                let frame_id = self.frame_arg(&args[0], line)?;
                let (x1, y1) = self.point_arg(&args[1], 2, line)?;
                let (x2, y2) = self.point_arg(&args[2], 3, line)?;
                let (cx, cy) = self.point_arg(&args[3], 4, line)?;
                let (r, g, b) = self.color_arg(&args[4], 5, line)?;
                self.mutate_frame(heap, frame_id, line, |frame| {
                    frame.make_curve(x1, y1, x2, y2, cx, cy, r, g, b);
                    Ok(())
                })
            }
            Self::Fill => {
                self.check_arity(args, 4, line)?;
                let frame_id = self.frame_arg(&args[0], line)?;
                let x = self.int_arg(&args[1], 2, line)?;
                let y = self.int_arg(&args[2], 3, line)?;
                let (r, g, b) = self.color_arg(&args[3], 4, line)?;
                self.mutate_frame(heap, frame_id, line, |frame| {
                    frame.fill(x, y, r, g, b);
                    Ok(())
                })
            }
            Self::LoadQgc => {
                self.check_arity(args, 1, line)?;
                let path = self.str_arg(&args[0], 1, line)?;
                let frame = codec::load_qgc(Path::new(&*path)).map_err(|exc| RunError::at_line(exc, line))?;
                Ok(Value::Frame(heap.alloc_frame(frame)))
            }
            Self::SaveQgc => {
                self.check_arity(args, 2, line)?;
                let frame_id = self.frame_arg(&args[0], line)?;
                let path = self.str_arg(&args[1], 2, line)?;
                codec::save_qgc(heap.frame(frame_id), Path::new(&*path)).map_err(|exc| RunError::at_line(exc, line))?;
                Ok(Value::None)
            }
        }
    }

    /// Runs a mutating frame operation and records the frame as touched
    /// when it actually wrote pixels.
    fn mutate_frame(
        self,
        heap: &mut Heap,
        frame_id: FrameId,
        line: u32,
        op: impl FnOnce(&mut Frame) -> Result<(), crate::frame::PixelOutOfRange>,
    ) -> RunResult<Value> {
        let before = heap.frame(frame_id).change_count();
        let result = op(heap.frame_mut(frame_id));
        if heap.frame(frame_id).change_count() != before {
            heap.touch(frame_id);
        }
        result.map_err(|err| RunError::runtime(err.to_string(), line))?;
        Ok(Value::None)
    }

    fn check_arity(self, args: &[Value], expected: usize, line: u32) -> RunResult<()> {
        if args.len() == expected {
            return Ok(());
        }
        Err(RunError::runtime(
            format!("{self} takes {expected} arguments, got {}", args.len()),
            line,
        ))
    }

    fn frame_arg(self, value: &Value, line: u32) -> RunResult<FrameId> {
        match value {
            Value::Frame(id) => Ok(*id),
            other => Err(RunError::runtime(
                format!("{self} argument 1 must be a Frame, not {}", other.type_name()),
                line,
            )),
        }
    }

    fn pixel_ref_arg(self, value: &Value, line: u32) -> RunResult<PixelRef> {
        match value {
            Value::PixelRef(ptr) => Ok(*ptr),
            other => Err(RunError::runtime(
                format!("{self} argument 1 must be frame->pixel, not {}", other.type_name()),
                line,
            )),
        }
    }

    /// A pixel reference degrades to its coordinates; otherwise the value
    /// must be a 2-tuple of integers.
    fn point_arg(self, value: &Value, position: usize, line: u32) -> RunResult<(i64, i64)> {
        match value {
            Value::PixelRef(ptr) => Ok((ptr.x, ptr.y)),
            Value::Tuple(items) => {
                if let [Value::Int(x), Value::Int(y)] = &**items {
                    return Ok((*x, *y));
                }
                Err(self.point_error(position, value, line))
            }
            _ => Err(self.point_error(position, value, line)),
        }
    }

    fn point_error(self, position: usize, value: &Value, line: u32) -> RunError {
        RunError::runtime(
            format!(
                "{self} argument {position} must be a pixel (x y) or frame->pixel, not {}",
                value.type_name()
            ),
            line,
        )
    }

    fn color_arg(self, value: &Value, position: usize, line: u32) -> RunResult<(i64, i64, i64)> {
        if let Value::Tuple(items) = value
            && let [Value::Int(r), Value::Int(g), Value::Int(b)] = &**items
        {
            return Ok((*r, *g, *b));
        }
        Err(RunError::runtime(
            format!(
                "{self} argument {position} must be a color (r g b), not {}",
                value.type_name()
            ),
            line,
        ))
    }

    fn int_arg(self, value: &Value, position: usize, line: u32) -> RunResult<i64> {
        match value {
            Value::Int(v) => Ok(*v),
            other => Err(RunError::runtime(
                format!("{self} argument {position} must be an int, not {}", other.type_name()),
                line,
            )),
        }
    }

    fn str_arg(self, value: &Value, position: usize, line: u32) -> RunResult<std::rc::Rc<str>> {
        match value {
            Value::Str(text) => Ok(text.clone()),
            other => Err(RunError::runtime(
                format!("{self} argument {position} must be a string, not {}", other.type_name()),
                line,
            )),
        }
    }
}
