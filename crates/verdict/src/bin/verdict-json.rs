//! JSON front-end for the verdict engine.
//!
//! Reads one JSON request from stdin, writes one JSON response to stdout,
//! and exits with: 0 success, 1 generic error, 2 invalid input,
//! 3 determinism mismatch, 4 policy deny. Logs go to stderr so stdout stays
//! machine-readable.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use serde::{Deserialize, Serialize};

use verdict::{
    evaluate, evaluate_gate, evaluate_with_context, AlgorithmParams, DecisionResult, DecisionSpec,
    EngineError, FsSnapshotStore, GateDecision, GatePolicy, ReplayReport, ReplayVerdict,
    RunContext, Snapshot, SnapshotStore, StoreError,
};

const EXIT_GENERIC: u8 = 1;
const EXIT_INVALID_INPUT: u8 = 2;
const EXIT_MISMATCH: u8 = 3;
const EXIT_POLICY_DENY: u8 = 4;

fn default_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Request {
    Evaluate {
        spec: DecisionSpec,
        params: AlgorithmParams,
        #[serde(default)]
        run_id: Option<String>,
    },
    SnapshotAppend {
        base_dir: PathBuf,
        run_id: String,
        spec: DecisionSpec,
        params: AlgorithmParams,
    },
    SnapshotLoad {
        base_dir: PathBuf,
        run_id: String,
    },
    SnapshotList {
        base_dir: PathBuf,
        #[serde(default)]
        prefix: String,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Replay {
        base_dir: PathBuf,
        run_id: String,
    },
    Gate {
        policy: GatePolicy,
        result: DecisionResult,
    },
}

#[derive(Debug, Default, Serialize)]
struct Response {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<DecisionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<Box<Snapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ReplayReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<GateDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    details: BTreeMap<String, String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        return emit(
            error_response("io_error", &format!("failed to read stdin: {err}")),
            EXIT_GENERIC,
        );
    }

    let request = match serde_json::from_str::<Request>(&input) {
        Ok(request) => request,
        Err(err) => {
            return emit(
                error_response("invalid_request", &format!("invalid request json: {err}")),
                EXIT_INVALID_INPUT,
            )
        }
    };

    let (response, code) = dispatch(request);
    emit(response, code)
}

fn dispatch(request: Request) -> (Response, u8) {
    match request {
        Request::Evaluate {
            spec,
            params,
            run_id,
        } => {
            let evaluated = match run_id {
                Some(run_id) => {
                    let mut ctx = RunContext::new();
                    evaluate_with_context(&spec, &params, None, &mut ctx, &run_id)
                }
                None => evaluate(&spec, &params, None),
            };
            match evaluated {
                Ok(result) => (
                    Response {
                        ok: true,
                        result: Some(result),
                        ..Response::default()
                    },
                    0,
                ),
                Err(err) => engine_error(&err),
            }
        }
        Request::SnapshotAppend {
            base_dir,
            run_id,
            spec,
            params,
        } => {
            let store = FsSnapshotStore::new(base_dir);
            let mut ctx = RunContext::new();
            let offset = ctx.offset();
            let result = match evaluate_with_context(&spec, &params, None, &mut ctx, &run_id) {
                Ok(result) => result,
                Err(err) => return engine_error(&err),
            };
            let snapshot = Snapshot::capture(run_id, spec, params, result, offset);
            match store.append(&snapshot) {
                Ok(path) => (
                    Response {
                        ok: true,
                        snapshot: Some(Box::new(snapshot)),
                        path: Some(path.display().to_string()),
                        ..Response::default()
                    },
                    0,
                ),
                Err(err) => store_error(&err),
            }
        }
        Request::SnapshotLoad { base_dir, run_id } => {
            let store = FsSnapshotStore::new(base_dir);
            match store.load(&run_id) {
                Ok(snapshot) => (
                    Response {
                        ok: true,
                        snapshot: Some(Box::new(snapshot)),
                        ..Response::default()
                    },
                    0,
                ),
                Err(err) => store_error(&err),
            }
        }
        Request::SnapshotList {
            base_dir,
            prefix,
            limit,
        } => {
            let store = FsSnapshotStore::new(base_dir);
            match store.list(&prefix, limit) {
                Ok(run_ids) => (
                    Response {
                        ok: true,
                        run_ids: Some(run_ids),
                        ..Response::default()
                    },
                    0,
                ),
                Err(err) => store_error(&err),
            }
        }
        Request::Replay { base_dir, run_id } => {
            let store = FsSnapshotStore::new(base_dir);
            let report = verdict::replay(&store, &run_id);
            let code = match report.verdict {
                ReplayVerdict::Pass | ReplayVerdict::Drift => 0,
                ReplayVerdict::Mismatch => EXIT_MISMATCH,
                ReplayVerdict::Degraded => EXIT_GENERIC,
            };
            (
                Response {
                    ok: code == 0,
                    report: Some(report),
                    ..Response::default()
                },
                code,
            )
        }
        Request::Gate { policy, result } => {
            let decision = evaluate_gate(&policy, &result);
            let code = if decision.allowed() { 0 } else { EXIT_POLICY_DENY };
            (
                Response {
                    ok: true,
                    decision: Some(decision),
                    ..Response::default()
                },
                code,
            )
        }
    }
}

fn engine_error(err: &EngineError) -> (Response, u8) {
    let code = match err {
        EngineError::AlgorithmError { .. } => EXIT_GENERIC,
        _ => EXIT_INVALID_INPUT,
    };
    (
        Response {
            ok: false,
            error: Some(ErrorBody {
                code: err.code().to_owned(),
                message: err.to_string(),
                details: err.details(),
            }),
            ..Response::default()
        },
        code,
    )
}

fn store_error(err: &StoreError) -> (Response, u8) {
    let code = match err {
        StoreError::InvalidRunId { .. } => EXIT_INVALID_INPUT,
        StoreError::FingerprintMismatch { .. } => EXIT_MISMATCH,
        _ => EXIT_GENERIC,
    };
    (
        Response {
            ok: false,
            error: Some(ErrorBody {
                code: err.code().to_owned(),
                message: err.to_string(),
                details: err.details(),
            }),
            ..Response::default()
        },
        code,
    )
}

fn error_response(code: &str, message: &str) -> Response {
    Response {
        ok: false,
        error: Some(ErrorBody {
            code: code.to_owned(),
            message: message.to_owned(),
            details: BTreeMap::new(),
        }),
        ..Response::default()
    }
}

fn emit(response: Response, code: u8) -> ExitCode {
    if serde_json::to_writer(io::stdout(), &response).is_err() {
        return ExitCode::from(EXIT_GENERIC);
    }
    ExitCode::from(code)
}
