//! Guest-side bootstrap
//!
//! Evaluated once per interpreter. The completion value is the private
//! helper table the bridge calls into; its `api` member is published under
//! the configured namespace global.
//!
//! Proxy handler traps stay arrow functions: a method would keep its handler
//! as home object and every proxy would then only be freed by a collector
//! pass instead of on its last release.

pub(crate) const SOURCE: &str = r#"
(() => {
    "use strict";

    const TAG = Symbol("tether.host");
    const frames = [];
    const types = new Map();

    class Record {}

    class ArityError extends Error {}
    Object.defineProperty(ArityError.prototype, "name", {
        value: "ArityError",
        writable: true,
        configurable: true,
    });

    const typeFor = (name) => {
        let ctor = types.get(name);
        if (ctor === undefined) {
            ctor = ({ [name]: class extends Record {} })[name];
            types.set(name, ctor);
        }
        return ctor;
    };

    const tag = (target, kind, id) => {
        Object.defineProperty(target, TAG, { value: Object.freeze({ kind, id }) });
        return target;
    };

    const api = Object.freeze({
        context: () => (frames.length === 0 ? undefined : frames[frames.length - 1]),
        type: typeFor,
        Record,
        ArityError,
    });

    return {
        api,

        arityError: (message) => new ArityError(message),

        call: (want, fn, args) => {
            frames.push(want);
            try {
                return fn(...args);
            } finally {
                frames.pop();
            }
        },

        callMethod: (want, receiver, name, args) => {
            const fn = receiver == null ? undefined : receiver[name];
            if (typeof fn !== "function") {
                throw new TypeError(`method '${name}' is not callable on ${typeof receiver}`);
            }
            frames.push(want);
            try {
                return fn.apply(receiver, args);
            } finally {
                frames.pop();
            }
        },

        mapping: (flat) => {
            const out = {};
            for (let i = 0; i + 1 < flat.length; i += 2) {
                Object.defineProperty(out, String(flat[i]), {
                    value: flat[i + 1],
                    writable: true,
                    enumerable: true,
                    configurable: true,
                });
            }
            return out;
        },

        entries: (value) => {
            const flat = [];
            if (value instanceof Map) {
                for (const [k, v] of value) flat.push(k, v);
                return flat;
            }
            if (value !== null && typeof value === "object" && !Array.isArray(value)) {
                for (const [k, v] of Object.entries(value)) flat.push(k, v);
                return flat;
            }
            return undefined;
        },

        tagCallback: (fn, id) => tag(fn, "callback", id),

        proxy: (id, typeName, fields, methods, delegates) => {
            const names = new Set(fields);
            const { get: getField, set: setField, call: callMethod } = delegates;
            const stubs = new Map();
            for (const method of methods) {
                stubs.set(method, (...args) => callMethod(method, ...args));
            }
            const target = Object.create(typeFor(typeName).prototype);
            for (const field of names) {
                Object.defineProperty(target, field, {
                    value: undefined,
                    writable: true,
                    enumerable: true,
                });
            }
            tag(target, "object", id);
            Object.preventExtensions(target);
            return new Proxy(target, {
                get: (t, key, receiver) => {
                    if (typeof key === "string") {
                        if (names.has(key)) return getField(key);
                        const stub = stubs.get(key);
                        if (stub !== undefined) return stub;
                    }
                    return Reflect.get(t, key, receiver);
                },
                set: (t, key, value) => {
                    if (typeof key === "string" && names.has(key)) {
                        setField(key, value);
                        return true;
                    }
                    throw new TypeError(`${typeName} has no field '${String(key)}'`);
                },
                defineProperty: () => false,
                deleteProperty: () => false,
            });
        },

        lookup: (value, kind) => {
            if (value === null || (typeof value !== "object" && typeof value !== "function")) {
                return undefined;
            }
            const found = value[TAG];
            return found !== undefined && found.kind === kind ? found.id : undefined;
        },
    };
})()
"#;
