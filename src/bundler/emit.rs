//! Bundle assembly: banner, runtime, module factories, bootstrap.

use super::graph::ModuleGraph;
use super::transform::transform;

/// The module runtime, left open for the factory array.
///
/// Helpers on the require function:
/// - `b`: base URL of the bundle script, for emitted assets
/// - `m`: the `import.meta` object shared by all modules
/// - `r`: mark an exports object as an ES module namespace
/// - `d`: define export getters
/// - `s`: re-export every name of another module
/// - `i`: view any exports object as a namespace (CommonJS interop)
const RUNTIME: &str = r#"(function (modules) {
  var cache = {};
  var hasOwn = Object.prototype.hasOwnProperty;

  function __kpack_require__(id) {
    var cached = cache[id];
    if (cached !== undefined) {
      return cached.exports;
    }
    var module = (cache[id] = { id: id, exports: {} });
    modules[id].call(module.exports, module, module.exports, __kpack_require__);
    return module.exports;
  }

  __kpack_require__.b = (function () {
    if (typeof document !== "undefined" && document.currentScript && document.currentScript.src) {
      return document.currentScript.src;
    }
    if (typeof location !== "undefined") {
      return location.href;
    }
    return "file:///";
  })();

  __kpack_require__.m = { url: __kpack_require__.b };

  __kpack_require__.r = function (exports) {
    if (typeof Symbol !== "undefined" && Symbol.toStringTag) {
      Object.defineProperty(exports, Symbol.toStringTag, { value: "Module" });
    }
    Object.defineProperty(exports, "__esModule", { value: true });
  };

  __kpack_require__.d = function (exports, getters) {
    for (var key in getters) {
      if (hasOwn.call(getters, key) && !hasOwn.call(exports, key)) {
        Object.defineProperty(exports, key, { enumerable: true, get: getters[key] });
      }
    }
  };

  __kpack_require__.s = function (exports, source) {
    Object.keys(source).forEach(function (key) {
      if (key !== "default" && !hasOwn.call(exports, key)) {
        Object.defineProperty(exports, key, {
          enumerable: true,
          get: function () { return source[key]; }
        });
      }
    });
  };

  __kpack_require__.i = function (exports) {
    if (exports && exports.__esModule) {
      return exports;
    }
    var ns = { "default": exports };
    if (exports !== null && (typeof exports === "object" || typeof exports === "function")) {
      Object.keys(exports).forEach(function (key) {
        if (key !== "default") {
          Object.defineProperty(ns, key, {
            enumerable: true,
            get: function () { return exports[key]; }
          });
        }
      });
    }
    return ns;
  };

  return __kpack_require__(0);
})(["#;

/// Render the complete bundle text.
///
/// The output depends only on the graph: no timestamps or absolute paths
/// are embedded, so identical sources give identical bytes.
pub fn emit(graph: &ModuleGraph, name: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("/*! {} | bundled by kpack */\n", name.replace("*/", "* /")));
    out.push_str(RUNTIME);
    out.push('\n');

    let last = graph.len().saturating_sub(1);
    for module in graph.modules() {
        out.push_str(&format!(
            "/* {}: {} */\n",
            module.id,
            graph.relative_path(module.id).replace("*/", "* /")
        ));
        out.push_str(&transform(module, graph.assets()));
        if module.id != last {
            out.push(',');
        }
        out.push('\n');
    }

    out.push_str("]);\n");
    out
}
